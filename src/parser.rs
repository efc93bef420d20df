pub mod error;

pub use self::error::*;

use nom::bytes::complete::*;
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{cut, map, recognize};
use nom::error::context;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

use std::borrow::Cow;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use memmap::Mmap;
use regex::bytes::Regex;

use crate::xml::{Document, Element, Tag};

type Res<'a, T> = IResult<&'a [u8], T, SyntaxError<'a>>;

/// Elements nested deeper than this are rejected.
const MAX_DEPTH: usize = 256;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod errno {
    pub const ENOTDIR: i32 = 20;
    pub const ELOOP: i32 = 40;
    pub const ENAMETOOLONG: i32 = 36;
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
mod errno {
    pub const ENOTDIR: i32 = 20;
    pub const ELOOP: i32 = 62;
    pub const ENAMETOOLONG: i32 = 63;
}

#[cfg(windows)]
mod errno {
    pub const ENOTDIR: i32 = 267;
    pub const ELOOP: i32 = 1921;
    pub const ENAMETOOLONG: i32 = 206;
}

fn classify_path_error(path: &Path, err: io::Error) -> ParseError {
    let path = path.to_path_buf();
    match err.raw_os_error() {
        Some(errno::ENOTDIR) => return ParseError::NotADirectoryComponent(path),
        Some(errno::ELOOP) => return ParseError::TooManySymlinks(path),
        Some(errno::ENAMETOOLONG) => return ParseError::PathTooLong(path),
        _ => (),
    }
    match err.kind() {
        io::ErrorKind::NotFound => ParseError::FileNotFound(path),
        io::ErrorKind::PermissionDenied => ParseError::PermissionDenied(path),
        _ => ParseError::IOError(err),
    }
}

/// Probe the file status of `path` before anything is read from it,
/// turning the usual failures into their own error variants.
pub fn check_path<P: AsRef<Path>>(path: P) -> CrassParseResult<()> {
    let path = path.as_ref();
    let meta =
        fs::metadata(path).map_err(|err| classify_path_error(path, err))?;
    if meta.is_dir() {
        return Err(ParseError::IOError(io::Error::new(
            io::ErrorKind::Other,
            format!("{} is a directory", path.display()),
        )));
    }
    Ok(())
}

/// Parse the crass document stored at `path`. The path is checked
/// first, then the file is memory mapped and parsed without any
/// validation against the schema.
pub fn parse_file<P: AsRef<Path>>(path: P) -> CrassParseResult<Document> {
    let path = path.as_ref();
    check_path(path)?;

    let file = File::open(path).map_err(|err| classify_path_error(path, err))?;
    // mapping an empty file fails, and there is nothing to parse anyway
    if file.metadata()?.len() == 0 {
        return Err(ParseError::EmptyDocument);
    }

    let mmap = unsafe { Mmap::map(&file)? };
    debug!("Parsing {} ({} bytes)", path.display(), mmap.len());
    parse_bytes(&mmap)
}

/// Parse a crass document held in memory.
pub fn parse_bytes(input: &[u8]) -> CrassParseResult<Document> {
    match document(input) {
        Ok((_, Some(root))) => Ok(Document::from_root(root)),
        Ok((_, None)) => Err(ParseError::EmptyDocument),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ParseError::syntax(input, e.input, &e.message))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::syntax(
            input,
            &input[input.len()..],
            "unexpected end of input",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    fn from_label(label: &[u8]) -> Option<Self> {
        let label = std::str::from_utf8(label).ok()?.to_ascii_lowercase();
        match label.as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1"
            | "latin-1" | "l1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Encoding::Latin1 => {
                if bytes.is_ascii() {
                    std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
                } else {
                    Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
                }
            }
        }
    }
}

fn ws0(i: &[u8]) -> Res<'_, &[u8]> {
    multispace0(i)
}

fn ws1(i: &[u8]) -> Res<'_, &[u8]> {
    multispace1(i)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

fn name(i: &[u8]) -> Res<'_, &[u8]> {
    context(
        "expected a name",
        recognize(pair(
            take_while_m_n(1, 1, is_name_start),
            take_while(is_name_char),
        )),
    )(i)
}

fn comment(i: &[u8]) -> Res<'_, ()> {
    map(
        preceded(
            tag("<!--"),
            cut(context(
                "unterminated comment",
                terminated(take_until("-->"), tag("-->")),
            )),
        ),
        |_| (),
    )(i)
}

fn processing_instruction(i: &[u8]) -> Res<'_, ()> {
    map(
        preceded(
            tag("<?"),
            cut(context(
                "unterminated processing instruction",
                terminated(take_until("?>"), tag("?>")),
            )),
        ),
        |_| (),
    )(i)
}

fn cdata(i: &[u8]) -> Res<'_, &[u8]> {
    preceded(
        tag("<![CDATA["),
        cut(context(
            "unterminated CDATA section",
            terminated(take_until("]]>"), tag("]]>")),
        )),
    )(i)
}

// The internal subset is skipped wholesale, entities it might declare
// are not supported.
fn doctype(i: &[u8]) -> Res<'_, ()> {
    let opening: Res<'_, &[u8]> = tag("<!DOCTYPE")(i);
    let (mut rest, _) = opening?;
    let mut in_subset = false;
    loop {
        match rest.first() {
            None => return Err(SyntaxError::failure(i, "unterminated DOCTYPE")),
            Some(b'[') => in_subset = true,
            Some(b']') => in_subset = false,
            Some(b'>') if !in_subset => return Ok((&rest[1..], ())),
            _ => (),
        }
        rest = &rest[1..];
    }
}

/// Comments, processing instructions and whitespace outside the root.
fn misc(mut i: &[u8]) -> Res<'_, ()> {
    loop {
        let (rest, _) = ws0(i)?;
        i = rest;
        if i.starts_with(b"<!--") {
            i = comment(i)?.0;
        } else if i.starts_with(b"<?") {
            i = processing_instruction(i)?.0;
        } else {
            return Ok((i, ()));
        }
    }
}

/// The XML declaration, if any; only the encoding is of interest.
fn declaration(i: &[u8]) -> Res<'_, Encoding> {
    lazy_static! {
        static ref RE_ENCODING: Regex =
            Regex::new(r#"(?-u)encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#)
                .unwrap();
    }

    let i = if i.starts_with(b"\xEF\xBB\xBF") { &i[3..] } else { i };
    let (i, _) = ws0(i)?;

    let decl: Res<'_, &[u8]> = delimited(
        terminated(tag("<?xml"), multispace1),
        cut(context("unterminated XML declaration", take_until("?>"))),
        tag("?>"),
    )(i);

    match decl {
        Ok((rest, body)) => match RE_ENCODING.captures(body) {
            Some(caps) => {
                let label = caps.get(1).map(|m| m.as_bytes()).unwrap_or(&b""[..]);
                match Encoding::from_label(label) {
                    Some(enc) => Ok((rest, enc)),
                    None => Err(SyntaxError::failure(i, "unsupported encoding")),
                }
            }
            None => Ok((rest, Encoding::Utf8)),
        },
        Err(nom::Err::Error(_)) => Ok((i, Encoding::Utf8)),
        Err(err) => Err(err),
    }
}

fn document(input: &[u8]) -> Res<'_, Option<Element>> {
    let (i, encoding) = declaration(input)?;
    let parser = XmlParser { encoding };

    let (i, _) = misc(i)?;
    let i = if i.starts_with(b"<!DOCTYPE") {
        let (i, _) = doctype(i)?;
        misc(i)?.0
    } else {
        i
    };

    if i.is_empty() {
        return Ok((i, None));
    }
    if !i.starts_with(b"<") {
        return Err(SyntaxError::failure(i, "content before the root element"));
    }

    let (i, root) = parser.element(i, 0)?;
    let (i, _) = misc(i)?;
    if !i.is_empty() {
        return Err(SyntaxError::failure(i, "content after the root element"));
    }
    Ok((i, Some(root)))
}

struct XmlParser {
    encoding: Encoding,
}

impl XmlParser {
    fn decode<'a>(&self, raw: &'a [u8]) -> Result<Cow<'a, str>, nom::Err<SyntaxError<'a>>> {
        self.encoding
            .decode(raw)
            .ok_or_else(|| SyntaxError::failure(raw, "invalid byte sequence for the declared encoding"))
    }

    /// Decodes character data or an attribute value, expanding
    /// predefined and numeric character references.
    fn decode_text<'a>(
        &self,
        raw: &'a [u8],
        attribute: bool,
    ) -> Result<String, nom::Err<SyntaxError<'a>>> {
        let mut result = String::with_capacity(raw.len());
        let mut rest = raw;

        loop {
            let amp = rest.iter().position(|&b| b == b'&').unwrap_or(rest.len());
            let segment = self.decode(&rest[..amp])?;
            if attribute {
                result.extend(segment.chars().map(|c| match c {
                    '\t' | '\n' | '\r' => ' ',
                    c => c,
                }));
            } else {
                result.push_str(&segment.replace("\r\n", "\n"));
            }

            if amp == rest.len() {
                return Ok(result);
            }

            rest = &rest[amp..];
            let semi = rest
                .iter()
                .position(|&b| b == b';')
                .ok_or_else(|| SyntaxError::failure(rest, "unterminated entity reference"))?;
            result.push(entity(&rest[1..semi]).ok_or_else(|| {
                SyntaxError::failure(rest, "unknown entity reference")
            })?);
            rest = &rest[semi + 1..];
        }
    }

    fn attribute<'a>(&self, i: &'a [u8]) -> Res<'a, (String, String)> {
        let (i, _) = ws1(i)?;
        let (i, raw_name) = name(i)?;
        let (i, _) = self.equals(i)?;
        let (i, raw_value) = self.quoted(i)?;

        let attr_name = self.decode(raw_name)?.into_owned();
        let value = self.decode_text(raw_value, true)?;
        Ok((i, (attr_name, value)))
    }

    fn equals<'a>(&self, i: &'a [u8]) -> Res<'a, ()> {
        map(
            cut(context(
                "expected '=' after attribute name",
                delimited(multispace0, char('='), multispace0),
            )),
            |_| (),
        )(i)
    }

    fn quoted<'a>(&self, i: &'a [u8]) -> Res<'a, &'a [u8]> {
        let double = delimited(
            char('"'),
            take_while(|b: u8| b != b'"' && b != b'<'),
            char('"'),
        );
        let single = delimited(
            char('\''),
            take_while(|b: u8| b != b'\'' && b != b'<'),
            char('\''),
        );
        cut(context(
            "expected a quoted attribute value",
            nom::branch::alt((double, single)),
        ))(i)
    }

    fn tag_end<'a>(&self, i: &'a [u8]) -> Res<'a, char> {
        cut(context("expected '>' or '/>'", char('>')))(i)
    }

    fn closing_tag<'a>(&self, i: &'a [u8], open: &[u8]) -> Res<'a, ()> {
        let (rest, close) = preceded(tag("</"), cut(name))(i)?;
        if close != open {
            return Err(SyntaxError::failure(
                i,
                format!(
                    "mismatched closing tag, expected </{}>",
                    String::from_utf8_lossy(open)
                ),
            ));
        }
        let (rest, _) = ws0(rest)?;
        map(cut(context("expected '>'", char('>'))), |_| ())(rest)
    }

    fn element<'a>(&self, i: &'a [u8], depth: usize) -> Res<'a, Element> {
        let start = i;
        if depth >= MAX_DEPTH {
            return Err(SyntaxError::failure(start, "elements nested too deeply"));
        }
        let (i, raw_name) = preceded(char('<'), cut(name))(i)?;
        let mut elem = Element::new(Tag::from_name(&self.decode(raw_name)?));

        let (i, attributes) =
            nom::multi::many0(|i: &'a [u8]| self.attribute(i))(i)?;
        for (attr_name, value) in attributes {
            if elem.attribute(&attr_name).is_some() {
                return Err(SyntaxError::failure(
                    start,
                    format!("duplicate attribute `{}`", attr_name),
                ));
            }
            elem.set_attribute(&attr_name, value);
        }

        let (i, _) = ws0(i)?;
        if i.starts_with(b"/>") {
            return Ok((&i[2..], elem));
        }
        let (mut i, _) = self.tag_end(i)?;

        let mut text = String::new();
        loop {
            let (rest, chars) = char_data(i)?;
            if !chars.is_empty() {
                text.push_str(&self.decode_text(chars, false)?);
            }
            i = rest;

            if i.is_empty() {
                return Err(SyntaxError::failure(
                    start,
                    format!(
                        "element <{}> is never closed",
                        String::from_utf8_lossy(raw_name)
                    ),
                ));
            } else if i.starts_with(b"</") {
                let (rest, _) = self.closing_tag(i, raw_name)?;
                i = rest;
                break;
            } else if i.starts_with(b"<!--") {
                i = comment(i)?.0;
            } else if i.starts_with(b"<![CDATA[") {
                let (rest, data) = cdata(i)?;
                text.push_str(&self.decode(data)?);
                i = rest;
            } else if i.starts_with(b"<?") {
                i = processing_instruction(i)?.0;
            } else {
                let (rest, child) = self.element(i, depth + 1)?;
                elem.push_child(child);
                i = rest;
            }
        }

        // indentation around children is not content
        if elem.children.is_empty() {
            elem.push_text(&text);
        } else if !text.trim().is_empty() {
            elem.push_text(text.trim());
        }

        Ok((i, elem))
    }
}

fn char_data(i: &[u8]) -> Res<'_, &[u8]> {
    take_while(|b: u8| b != b'<')(i)
}

fn entity(name: &[u8]) -> Option<char> {
    match name {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        _ => {
            let digits = name.strip_prefix(b"#")?;
            let digits = std::str::from_utf8(digits).ok()?;
            let code = match digits.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            if code == 0 {
                return None;
            }
            std::char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::attr;

    fn syntax_message(res: CrassParseResult<Document>) -> String {
        match res {
            Err(ParseError::Syntax { message, .. }) => message,
            Err(e) => panic!("expected a syntax error, got {}", e),
            Ok(_) => panic!("expected a syntax error, parsed fine"),
        }
    }

    #[test]
    fn can_parse_small_document() {
        let input = br#"<?xml version="1.0" encoding="ISO-8859-1" standalone="no" ?>
<crass_assem version="1.0">
  <group gid="4" drseq="GTTTCAATCCACGCGCCCACGCGGGGCGCGAC">
    <metadata>
      <notes>assembled by hand</notes>
      <file type="sequence" url="Group_4.fa"/>
    </metadata>
    <assembly>
      <contig cid="C1">
        <consensus>ACGGT</consensus>
        <cspacer spid="SP1"/>
        <cspacer spid='SP2' />
      </contig>
    </assembly>
  </group>
</crass_assem>
"#;
        let doc = parse_bytes(input).unwrap();
        assert_eq!(doc.version(), Some("1.0"));

        let group = doc.root().first_child(&Tag::Group).unwrap();
        assert_eq!(group.attribute(attr::GID), Some("4"));
        assert_eq!(group.children.len(), 2);

        let notes = group
            .first_child(&Tag::Metadata)
            .and_then(|m| m.first_child(&Tag::Notes))
            .unwrap();
        assert_eq!(notes.text(), Some("assembled by hand"));

        let contig = group
            .first_child(&Tag::Assembly)
            .and_then(|a| a.first_child(&Tag::Contig))
            .unwrap();
        assert_eq!(contig.text(), None);
        let spids: Vec<_> = contig
            .children_with_tag(&Tag::CSpacer)
            .filter_map(|c| c.attribute(attr::SPID))
            .collect();
        assert_eq!(spids, vec!["SP1", "SP2"]);
    }

    #[test]
    fn entities_and_encodings() {
        let input = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<crass_assem version=\"1\"><notes a=\"x&amp;y&#10;\">&lt;\xFC&#x3b1;&gt;</notes></crass_assem>";
        let doc = parse_bytes(input).unwrap();
        let notes = doc.root().first_child(&Tag::Notes).unwrap();
        assert_eq!(notes.text(), Some("<\u{fc}\u{3b1}>"));
        assert_eq!(notes.attribute("a"), Some("x&y\n"));

        // without a declaration the document is UTF-8
        let doc = parse_bytes("<a><b>\u{fc}</b></a>".as_bytes()).unwrap();
        let b = doc.root().first_child(&Tag::Unknown("b".into())).unwrap();
        assert_eq!(b.text(), Some("\u{fc}"));

        let res = parse_bytes(b"<a>\xFC</a>");
        assert!(syntax_message(res).contains("invalid byte sequence"));
    }

    #[test]
    fn comments_cdata_and_doctype() {
        let input = b"<?xml version=\"1.0\"?>
<!DOCTYPE crass_assem [ <!ELEMENT crass_assem ANY> ]>
<!-- produced by a test -->
<crass_assem version=\"1.0\"><consensus>AC<!-- gap -->G<![CDATA[T<>]]></consensus></crass_assem>
<!-- trailing -->
";
        let doc = parse_bytes(input).unwrap();
        let cons = doc.root().first_child(&Tag::Consensus).unwrap();
        assert_eq!(cons.text(), Some("ACGT<>"));
    }

    #[test]
    fn foreign_tags_parse() {
        let doc = parse_bytes(b"<crass_assem><gruop gid=\"1\"/></crass_assem>").unwrap();
        assert_eq!(
            doc.root().children[0].tag,
            Tag::Unknown("gruop".to_string())
        );
    }

    #[test]
    fn empty_documents() {
        for input in &[
            &b""[..],
            &b"   \n"[..],
            &b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<!-- nothing -->"[..],
        ] {
            match parse_bytes(input) {
                Err(ParseError::EmptyDocument) => (),
                other => panic!("expected an empty document, got {:?}", other),
            }
        }
    }

    #[test]
    fn malformed_documents() {
        assert!(syntax_message(parse_bytes(b"<a><b></a>")).contains("mismatched"));
        assert!(syntax_message(parse_bytes(b"<a>")).contains("never closed"));
        assert!(syntax_message(parse_bytes(b"<a x=\"1\" x=\"2\"/>"))
            .contains("duplicate attribute"));
        assert!(syntax_message(parse_bytes(b"<a x=1/>")).contains("quoted"));
        assert!(syntax_message(parse_bytes(b"<a/><b/>")).contains("after the root"));
        assert!(syntax_message(parse_bytes(b"text")).contains("before the root"));
        assert!(syntax_message(parse_bytes(b"<a>&bogus;</a>")).contains("unknown entity"));
        assert!(syntax_message(parse_bytes(b"<a><!-- open</a>")).contains("comment"));
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let depth = 10_000;
        let mut input = b"<a>".repeat(depth);
        input.extend_from_slice(&b"</a>".repeat(depth));
        let message = syntax_message(parse_bytes(&input));
        assert!(message.contains("nested too deeply"));

        let mut input = b"<a>".repeat(MAX_DEPTH);
        input.extend_from_slice(&b"</a>".repeat(MAX_DEPTH));
        assert!(parse_bytes(&input).is_ok());
    }

    #[test]
    fn declaration_after_leading_whitespace() {
        let input = b"\n  <?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<a>\xFC</a>";
        let doc = parse_bytes(input).unwrap();
        assert_eq!(doc.root().text(), Some("\u{fc}"));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        match parse_bytes(b"<a>\n  <b>\n  </c>\n</a>") {
            Err(ParseError::Syntax { line, column, .. }) => {
                assert_eq!((line, column), (3, 3));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn path_checks() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.xml");
        match parse_file(&missing) {
            Err(ParseError::FileNotFound(p)) => assert_eq!(p, missing),
            other => panic!("unexpected result {:?}", other),
        }

        let plain = dir.path().join("plain");
        std::fs::write(&plain, b"x").unwrap();
        match parse_file(plain.join("doc.xml")) {
            Err(ParseError::NotADirectoryComponent(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }

        let long = dir.path().join("x".repeat(300));
        match parse_file(&long) {
            Err(ParseError::PathTooLong(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }

        let empty = dir.path().join("empty.xml");
        std::fs::write(&empty, b"").unwrap();
        match parse_file(&empty) {
            Err(ParseError::EmptyDocument) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn permission_errors_are_classified() {
        let path = Path::new("locked/doc.xml");
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        match classify_path_error(path, err) {
            ParseError::PermissionDenied(p) => assert_eq!(p, path),
            other => panic!("unexpected error {:?}", other),
        }

        let err = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(
            classify_path_error(path, err),
            ParseError::FileNotFound(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("doc.xml"), b"<a/>").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores directory permissions
        let privileged = std::fs::read_dir(&locked).is_ok();
        let res = parse_file(locked.join("doc.xml"));
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        if !privileged {
            match res {
                Err(ParseError::PermissionDenied(_)) => (),
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::os::unix::fs::symlink(&a, &b).unwrap();
        std::os::unix::fs::symlink(&b, &a).unwrap();
        match parse_file(&a) {
            Err(ParseError::TooManySymlinks(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
