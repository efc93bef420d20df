use super::{attr, Document, Element, SpacerSide, Tag};

/// Typed builders for the crass schema. Each one appends a single
/// element under `self` and hands it back for further nesting; none of
/// them check that `self` is the right parent, that is up to the
/// assembly driver.
impl Element {
    pub fn add_metadata(&mut self) -> &mut Element {
        self.append_child(Tag::Metadata, &[])
    }

    pub fn add_notes(&mut self, notes: &str) -> &mut Element {
        let elem = self.append_child(Tag::Notes, &[]);
        elem.set_text(notes);
        elem
    }

    pub fn add_file(&mut self, file_type: &str, url: &str) -> &mut Element {
        self.append_child(Tag::File, &[(attr::TYPE, file_type), (attr::URL, url)])
    }

    /// Adds `data` along with its three empty containers `drs`,
    /// `spacers` and `flankers`, in that order.
    pub fn add_data(&mut self) -> &mut Element {
        let data = self.append_child(Tag::Data, &[]);
        data.append_child(Tag::Drs, &[]);
        data.append_child(Tag::Spacers, &[]);
        data.append_child(Tag::Flankers, &[]);
        data
    }

    pub fn add_direct_repeat(&mut self, drid: &str, seq: &str) -> &mut Element {
        self.append_child(Tag::Dr, &[(attr::DRID, drid), (attr::SEQ, seq)])
    }

    pub fn add_spacer(
        &mut self,
        spid: &str,
        seq: &str,
        cov: Option<f64>,
    ) -> &mut Element {
        let spacer =
            self.append_child(Tag::Spacer, &[(attr::SPID, spid), (attr::SEQ, seq)]);
        if let Some(cov) = cov {
            spacer.set_attribute(attr::COV, cov.to_string());
        }
        spacer
    }

    pub fn add_flanker(&mut self, flid: &str, seq: &str) -> &mut Element {
        self.append_child(Tag::Flanker, &[(attr::FLID, flid), (attr::SEQ, seq)])
    }

    pub fn add_assembly(&mut self) -> &mut Element {
        self.append_child(Tag::Assembly, &[])
    }

    pub fn add_contig(&mut self, cid: &str, cov: Option<f64>) -> &mut Element {
        let contig = self.append_child(Tag::Contig, &[(attr::CID, cid)]);
        if let Some(cov) = cov {
            contig.set_attribute(attr::COV, cov.to_string());
        }
        contig
    }

    pub fn create_consensus(&mut self, consensus: &str) -> &mut Element {
        let elem = self.append_child(Tag::Consensus, &[]);
        elem.set_text(consensus);
        elem
    }

    /// References a spacer (by `spid`) from within a contig.
    pub fn add_spacer_to_contig(&mut self, spid: &str) -> &mut Element {
        self.append_child(Tag::CSpacer, &[(attr::SPID, spid)])
    }

    /// `fspacers` or `bspacers`, depending on the side.
    pub fn create_spacers(&mut self, side: SpacerSide) -> &mut Element {
        self.append_child(side.spacers_tag(), &[])
    }

    /// `fs` or `bs`.
    pub fn add_linked_spacer(
        &mut self,
        side: SpacerSide,
        spid: &str,
        drid: &str,
        drconf: u32,
    ) -> &mut Element {
        let drconf = drconf.to_string();
        self.append_child(
            side.spacer_tag(),
            &[(attr::SPID, spid), (attr::DRID, drid), (attr::DRCONF, drconf.as_str())],
        )
    }

    /// `fflankers` or `bflankers`.
    pub fn create_flankers(&mut self, side: SpacerSide) -> &mut Element {
        self.append_child(side.flankers_tag(), &[])
    }

    /// `ff` or `bf`.
    pub fn add_linked_flanker(
        &mut self,
        side: SpacerSide,
        flid: &str,
        drconf: u32,
        directjoin: bool,
    ) -> &mut Element {
        let drconf = drconf.to_string();
        let directjoin = if directjoin { "1" } else { "0" };
        self.append_child(
            side.flanker_tag(),
            &[
                (attr::FLID, flid),
                (attr::DRCONF, drconf.as_str()),
                (attr::DIRECTJOIN, directjoin),
            ],
        )
    }
}

impl Document {
    pub fn add_group(&mut self, gid: &str, drseq: &str) -> &mut Element {
        self.root_mut()
            .append_child(Tag::Group, &[(attr::GID, gid), (attr::DRSEQ, drseq)])
    }
}
