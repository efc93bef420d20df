#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// The element names of the crass schema. Anything else found in a
/// parsed document ends up in `Unknown`, which the writer emits
/// verbatim and the queries never match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum Tag {
    CrassAssem,
    Group,
    Metadata,
    Notes,
    File,
    Data,
    Drs,
    Dr,
    Spacers,
    Spacer,
    Flankers,
    Flanker,
    Assembly,
    Contig,
    Consensus,
    CSpacer,
    FSpacers,
    BSpacers,
    Fs,
    Bs,
    FFlankers,
    BFlankers,
    Ff,
    Bf,
    Unknown(String),
}

macro_rules! tag_names {
    ($(($var:ident, $name:literal)),* $(,)?) => {
        impl Tag {
            /// The literal element name as it appears in the document.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Tag::$var => $name,)*
                    Tag::Unknown(name) => name.as_str(),
                }
            }

            /// Never fails; names outside the schema become `Unknown`.
            pub fn from_name(name: &str) -> Self {
                match name {
                    $($name => Tag::$var,)*
                    other => Tag::Unknown(other.to_string()),
                }
            }
        }
    };
}

tag_names!(
    (CrassAssem, "crass_assem"),
    (Group, "group"),
    (Metadata, "metadata"),
    (Notes, "notes"),
    (File, "file"),
    (Data, "data"),
    (Drs, "drs"),
    (Dr, "dr"),
    (Spacers, "spacers"),
    (Spacer, "spacer"),
    (Flankers, "flankers"),
    (Flanker, "flanker"),
    (Assembly, "assembly"),
    (Contig, "contig"),
    (Consensus, "consensus"),
    (CSpacer, "cspacer"),
    (FSpacers, "fspacers"),
    (BSpacers, "bspacers"),
    (Fs, "fs"),
    (Bs, "bs"),
    (FFlankers, "fflankers"),
    (BFlankers, "bflankers"),
    (Ff, "ff"),
    (Bf, "bf"),
);

impl Tag {
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, Tag::Unknown(_))
    }
}

/// Which end of the repeat array a linked spacer or flanker hangs
/// off. Selects between the `fs`/`bs` and `ff`/`bf` literal tags so a
/// single builder covers both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum SpacerSide {
    Forward,
    Backward,
}

impl SpacerSide {
    #[inline]
    pub fn spacers_tag(&self) -> Tag {
        match self {
            Self::Forward => Tag::FSpacers,
            Self::Backward => Tag::BSpacers,
        }
    }

    #[inline]
    pub fn spacer_tag(&self) -> Tag {
        match self {
            Self::Forward => Tag::Fs,
            Self::Backward => Tag::Bs,
        }
    }

    #[inline]
    pub fn flankers_tag(&self) -> Tag {
        match self {
            Self::Forward => Tag::FFlankers,
            Self::Backward => Tag::BFlankers,
        }
    }

    #[inline]
    pub fn flanker_tag(&self) -> Tag {
        match self {
            Self::Forward => Tag::Ff,
            Self::Backward => Tag::Bf,
        }
    }
}

/// Default side is forward
impl Default for SpacerSide {
    #[inline]
    fn default() -> SpacerSide {
        SpacerSide::Forward
    }
}

impl std::str::FromStr for Tag {
    type Err = std::convert::Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Tag::from_name(s))
    }
}

/// Display writes the literal element name.
///
/// # Examples
///
/// ```
/// use crass::xml::Tag;
///
/// assert_eq!(&format!("{}", Tag::CSpacer), "cspacer");
/// assert_eq!(&format!("{}", Tag::from_name("bf")), "bf");
/// ```
impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
