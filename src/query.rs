use std::collections::HashSet;
use std::hash::BuildHasher;
use std::io::{self, Write};
use std::{error, fmt};

use log::{debug, warn};

use crate::xml::{attr, Document, Element, Tag};

/// Raised when the document does not have the structure a query
/// walks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No top-level group carries the wanted `gid`.
    GroupNotFound(String),
    /// The group exists but has no `assembly` child.
    NoAssemblyForGroup(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::GroupNotFound(gid) => {
                write!(f, "Could not find group {} in the document", gid)
            }
            QueryError::NoAssemblyForGroup(gid) => {
                write!(f, "Group {} has no assembly", gid)
            }
        }
    }
}

impl error::Error for QueryError {}

/// A group located by `find_group`, along with its direct repeat
/// consensus.
#[derive(Debug, Clone, Copy)]
pub struct GroupMatch<'a> {
    pub element: &'a Element,
    pub direct_repeat: &'a str,
}

/// The contigs picked out of an assembly, and the spacer ids they
/// reference, in document order.
#[derive(Debug, Clone, Default)]
pub struct ContigSelection<'a> {
    pub contigs: Vec<&'a Element>,
    pub spacer_ids: Vec<String>,
}

/// Everything a per-group assembly run needs from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyInputs {
    pub direct_repeat: String,
    pub spacer_ids: Vec<String>,
}

/// Find the first top-level `group` whose `gid` is `gid`.
pub fn find_group<'a>(root: &'a Element, gid: &str) -> Result<GroupMatch<'a>, QueryError> {
    let element = root
        .children_with_tag(&Tag::Group)
        .find(|g| g.attribute(attr::GID) == Some(gid))
        .ok_or_else(|| QueryError::GroupNotFound(gid.to_string()))?;

    let direct_repeat = element.attribute(attr::DRSEQ).unwrap_or_else(|| {
        warn!("Group {} has no direct repeat sequence", gid);
        ""
    });

    Ok(GroupMatch {
        element,
        direct_repeat,
    })
}

/// Find the `assembly` child of a group.
pub fn find_assembly(group: &Element) -> Result<&Element, QueryError> {
    group.first_child(&Tag::Assembly).ok_or_else(|| {
        let gid = group.attribute(attr::GID).unwrap_or_default();
        QueryError::NoAssemblyForGroup(gid.to_string())
    })
}

/// Select the contigs of an assembly whose `cid` is in `wanted`, and
/// collect the `spid` of every `cspacer` directly under them.
/// Duplicates are kept as they appear.
pub fn collect_contigs<'a, S: BuildHasher>(
    assembly: &'a Element,
    wanted: &HashSet<String, S>,
) -> ContigSelection<'a> {
    let mut selection = ContigSelection::default();

    for contig in assembly.children_with_tag(&Tag::Contig) {
        let cid = match contig.attribute(attr::CID) {
            Some(cid) => cid,
            None => continue,
        };
        if !wanted.contains(cid) {
            continue;
        }

        selection.contigs.push(contig);
        selection.spacer_ids.extend(
            contig
                .children_with_tag(&Tag::CSpacer)
                .filter_map(|s| s.attribute(attr::SPID))
                .map(String::from),
        );
    }

    selection
}

/// Locate the group, its assembly and the wanted contigs, stopping at
/// the first missing piece.
pub fn extract_assembly_inputs<S: BuildHasher>(
    doc: &Document,
    gid: &str,
    wanted: &HashSet<String, S>,
) -> Result<AssemblyInputs, QueryError> {
    let group = find_group(doc.root(), gid)?;
    let assembly = find_assembly(group.element)?;
    let selection = collect_contigs(assembly, wanted);

    debug!(
        "Group {}: {} of {} wanted contigs found, {} spacers",
        gid,
        selection.contigs.len(),
        wanted.len(),
        selection.spacer_ids.len()
    );

    Ok(AssemblyInputs {
        direct_repeat: group.direct_repeat.to_string(),
        spacer_ids: selection.spacer_ids,
    })
}

/// The read file name of each top-level group, `Group_<gid>_<drseq>.fa`.
pub fn group_file_names(doc: &Document) -> impl Iterator<Item = String> + '_ {
    doc.groups().map(|g| {
        format!(
            "Group_{}_{}.fa",
            g.attribute(attr::GID).unwrap_or_default(),
            g.attribute(attr::DRSEQ).unwrap_or_default()
        )
    })
}

/// Write `group_file_names` one per line.
pub fn dump_groups<W: Write>(doc: &Document, out: &mut W) -> io::Result<()> {
    for name in group_file_names(doc) {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}
