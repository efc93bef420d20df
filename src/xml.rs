pub mod builder;
pub mod tag;

pub use self::tag::*;

use std::{error, fmt};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

// The in-memory crass document: a strict tree of `Element`s owned by
// a single `Document`, along with the attribute names the schema uses.

/// Attribute names used by the crass schema.
pub mod attr {
    pub const VERSION: &str = "version";
    pub const GID: &str = "gid";
    pub const DRSEQ: &str = "drseq";
    pub const DRID: &str = "drid";
    pub const SEQ: &str = "seq";
    pub const SPID: &str = "spid";
    pub const FLID: &str = "flid";
    pub const CID: &str = "cid";
    pub const COV: &str = "cov";
    pub const TYPE: &str = "type";
    pub const URL: &str = "url";
    pub const CONFCNT: &str = "confcnt";
    pub const TOTCNT: &str = "totcnt";
    pub const DRCONF: &str = "drconf";
    pub const DIRECTJOIN: &str = "directjoin";
}

/// Cause codes carried by `DocumentError`.
pub const OUT_OF_MEMORY: i32 = 1;
pub const TRANSCODE: i32 = 2;
pub const GENERIC: i32 = 3;

/// Errors raised while creating or serializing a document.
#[derive(Debug)]
pub enum DocumentError {
    /// The document could not be allocated; includes the cause code.
    Allocation(i32),
    /// The document could not be written out. `code` is one of
    /// `OUT_OF_MEMORY`, `TRANSCODE` or `GENERIC`.
    Serialization { code: i32, message: String },
}

impl DocumentError {
    pub fn code(&self) -> i32 {
        match self {
            DocumentError::Allocation(code) => *code,
            DocumentError::Serialization { code, .. } => *code,
        }
    }

    pub(crate) fn transcode(name: &str) -> Self {
        DocumentError::Serialization {
            code: TRANSCODE,
            message: format!("`{}` cannot be encoded as ISO-8859-1", name),
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::Allocation(code) => {
                write!(f, "Failed to allocate document (code {})", code)
            }
            DocumentError::Serialization { code, message } => {
                write!(f, "Failed to serialize document (code {}): {}", code, message)
            }
        }
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::OutOfMemory => OUT_OF_MEMORY,
            _ => GENERIC,
        };
        DocumentError::Serialization {
            code,
            message: err.to_string(),
        }
    }
}

impl error::Error for DocumentError {}

/// A node of the document tree. Attribute names are unique and keep
/// their insertion order; children are ordered and the first child
/// with a given tag is the one queries pick.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Element {
    pub tag: Tag,
    attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Element {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    pub fn with_attributes(tag: Tag, attributes: &[(&str, &str)]) -> Self {
        let mut elem = Element::new(tag);
        for (name, value) in attributes {
            elem.set_attribute(name, *value);
        }
        elem
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing the value in place if the name
    /// already exists.
    pub fn set_attribute<V: Into<String>>(&mut self, name: &str, value: V) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Replaces the text content of the element.
    pub fn set_text<V: Into<String>>(&mut self, value: V) {
        self.text = Some(value.into());
    }

    pub(crate) fn push_text(&mut self, value: &str) {
        match &mut self.text {
            Some(text) => text.push_str(value),
            None => self.text = Some(value.to_string()),
        }
    }

    /// Appends a new element as the last child and returns it so it
    /// can be nested into. Nothing here checks the schema.
    pub fn append_child(
        &mut self,
        tag: Tag,
        attributes: &[(&str, &str)],
    ) -> &mut Element {
        self.push_child(Element::with_attributes(tag, attributes))
    }

    pub fn push_child(&mut self, child: Element) -> &mut Element {
        let idx = self.children.len();
        self.children.push(child);
        &mut self.children[idx]
    }

    pub fn first_child(&self, tag: &Tag) -> Option<&Element> {
        self.children.iter().find(|c| &c.tag == tag)
    }

    pub fn first_child_mut(&mut self, tag: &Tag) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| &c.tag == tag)
    }

    pub fn children_with_tag<'a>(
        &'a self,
        tag: &'a Tag,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| &c.tag == tag)
    }

    fn sorted_attributes(&self) -> Vec<(&str, &str)> {
        let mut attrs: Vec<_> = self.attributes().collect();
        attrs.sort_unstable();
        attrs
    }
}

/// Two elements are equal when they have the same tag, text, the same
/// set of attributes in any order, and pairwise equal children in the
/// same order.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.text == other.text
            && self.sorted_attributes() == other.sorted_attributes()
            && self.children == other.children
    }
}

impl Eq for Element {}

/// A crass document, owning exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Document {
    root: Element,
}

impl Document {
    /// Create a fresh document whose root carries the given version.
    pub fn new(root_tag: Tag, version: &str) -> Result<Self, DocumentError> {
        Self::with_capacity(root_tag, version, 0)
    }

    /// Like `new`, reserving room for `groups` top-level children up
    /// front.
    pub fn with_capacity(
        root_tag: Tag,
        version: &str,
        groups: usize,
    ) -> Result<Self, DocumentError> {
        let mut children = Vec::new();
        children
            .try_reserve(groups)
            .map_err(|_| DocumentError::Allocation(OUT_OF_MEMORY))?;

        let mut root = Element::new(root_tag);
        root.children = children;
        root.set_attribute(attr::VERSION, version);
        Ok(Document { root })
    }

    /// A document rooted at `crass_assem`.
    pub fn crass(version: &str) -> Result<Self, DocumentError> {
        Self::new(Tag::CrassAssem, version)
    }

    pub(crate) fn from_root(root: Element) -> Self {
        Document { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn version(&self) -> Option<&str> {
        self.root.attribute(attr::VERSION)
    }

    /// Iterate over the top-level `group` elements
    pub fn groups(&self) -> impl Iterator<Item = &Element> {
        self.root.children.iter().filter(|c| c.tag == Tag::Group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_version() {
        let doc = Document::crass("1.0").unwrap();
        assert_eq!(doc.root().tag, Tag::CrassAssem);
        assert_eq!(doc.version(), Some("1.0"));
        assert!(doc.root().children.is_empty());
    }

    #[test]
    fn huge_reservation_is_an_allocation_error() {
        let res = Document::with_capacity(Tag::CrassAssem, "1.0", usize::MAX);
        match res {
            Err(DocumentError::Allocation(code)) => {
                assert_eq!(code, OUT_OF_MEMORY)
            }
            _ => panic!("expected an allocation error"),
        }
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut elem =
            Element::with_attributes(Tag::Spacer, &[("spid", "SP1"), ("seq", "AC")]);
        elem.set_attribute("spid", "SP2");
        let attrs: Vec<_> = elem.attributes().collect();
        assert_eq!(attrs, vec![("spid", "SP2"), ("seq", "AC")]);
    }

    #[test]
    fn append_child_returns_new_last_child() {
        let mut doc = Document::crass("1.0").unwrap();
        let group = doc
            .root_mut()
            .append_child(Tag::Group, &[("gid", "G1"), ("drseq", "ACGT")]);
        group.append_child(Tag::Data, &[]);
        group.append_child(Tag::Assembly, &[]);

        let group = doc.root().first_child(&Tag::Group).unwrap();
        let tags: Vec<_> = group.children.iter().map(|c| c.tag.clone()).collect();
        assert_eq!(tags, vec![Tag::Data, Tag::Assembly]);
    }

    #[test]
    fn equality_ignores_attribute_order() {
        let a = Element::with_attributes(Tag::Dr, &[("drid", "DR1"), ("seq", "A")]);
        let b = Element::with_attributes(Tag::Dr, &[("seq", "A"), ("drid", "DR1")]);
        let c = Element::with_attributes(Tag::Dr, &[("seq", "C"), ("drid", "DR1")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn documents_convert_to_json_and_back() {
        let mut doc = Document::crass("1.0").unwrap();
        let group = doc.add_group("3", "GTTTC");
        group.add_metadata().add_notes("from json");
        group.append_child(Tag::Unknown("extra".into()), &[("k", "v")]);

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"GTTTC\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn children_with_tag_keeps_document_order() {
        let mut root = Element::new(Tag::Assembly);
        root.append_child(Tag::Contig, &[("cid", "C1")]);
        root.append_child(Tag::Unknown("x".into()), &[]);
        root.append_child(Tag::Contig, &[("cid", "C2")]);

        let cids: Vec<_> = root
            .children_with_tag(&Tag::Contig)
            .filter_map(|c| c.attribute("cid"))
            .collect();
        assert_eq!(cids, vec!["C1", "C2"]);
    }
}
