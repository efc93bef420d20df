use crate::xml::{Document, DocumentError, Element};

use log::{debug, error};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const DECLARATION: &[u8] =
    b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\" standalone=\"no\" ?>\n";
const INDENT: &[u8] = b"  ";

// Element and attribute names must be representable in ISO-8859-1,
// values are not restricted since anything else becomes a character
// reference.
fn encode_name(name: &str) -> Result<Vec<u8>, DocumentError> {
    name.chars()
        .map(|c| {
            let c = c as u32;
            if c <= 0xFF {
                Ok(c as u8)
            } else {
                Err(DocumentError::transcode(name))
            }
        })
        .collect()
}

fn write_escaped<W: Write>(out: &mut W, value: &str, attribute: bool) -> io::Result<()> {
    for c in value.chars() {
        match c {
            '&' => out.write_all(b"&amp;")?,
            '<' => out.write_all(b"&lt;")?,
            '>' => out.write_all(b"&gt;")?,
            '"' if attribute => out.write_all(b"&quot;")?,
            '\t' | '\n' if attribute => write!(out, "&#{};", c as u32)?,
            // a literal CR would be folded into the following LF on reading
            '\r' => out.write_all(b"&#13;")?,
            c if (c as u32) <= 0xFF => out.write_all(&[c as u8])?,
            c => write!(out, "&#{};", c as u32)?,
        }
    }
    Ok(())
}

fn write_indent<W: Write>(out: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        out.write_all(INDENT)?;
    }
    Ok(())
}

fn write_element<W: Write>(
    elem: &Element,
    depth: usize,
    out: &mut W,
) -> Result<(), DocumentError> {
    let name = encode_name(elem.tag.as_str())?;

    write_indent(out, depth)?;
    out.write_all(b"<")?;
    out.write_all(&name)?;

    for (attr_name, value) in elem.attributes() {
        // empty values are the same as absent ones
        if value.is_empty() {
            continue;
        }
        out.write_all(b" ")?;
        out.write_all(&encode_name(attr_name)?)?;
        out.write_all(b"=\"")?;
        write_escaped(out, value, true)?;
        out.write_all(b"\"")?;
    }

    let text = elem.text();

    if elem.children.is_empty() && text.is_none() {
        out.write_all(b"/>\n")?;
        return Ok(());
    }

    out.write_all(b">")?;
    if let Some(text) = text {
        write_escaped(out, text, false)?;
    }

    if !elem.children.is_empty() {
        out.write_all(b"\n")?;
        for child in elem.children.iter() {
            write_element(child, depth + 1, out)?;
        }
        write_indent(out, depth)?;
    }

    out.write_all(b"</")?;
    out.write_all(&name)?;
    out.write_all(b">\n")?;
    Ok(())
}

/// Serialize a document as indented ISO-8859-1 text, starting with
/// the XML declaration. No byte order mark is written.
pub fn write_document<W: Write>(
    doc: &Document,
    out: &mut W,
) -> Result<(), DocumentError> {
    out.write_all(DECLARATION)?;
    write_element(doc.root(), 0, out)
}

/// Serialize a document into a byte vector.
pub fn document_bytes(doc: &Document) -> Result<Vec<u8>, DocumentError> {
    let mut buf = Vec::new();
    write_document(doc, &mut buf)?;
    Ok(buf)
}

fn write_to_sink<W: Write>(doc: &Document, out: W, sink: &str) -> bool {
    let mut out = BufWriter::new(out);
    let result = write_document(doc, &mut out)
        .and_then(|_| out.flush().map_err(DocumentError::from));

    match result {
        Ok(()) => {
            debug!("Wrote crass document to {}", sink);
            true
        }
        Err(err) => {
            error!("Could not write crass document to {}: {}", sink, err);
            false
        }
    }
}

impl Document {
    /// Write the document to the file at `path`, replacing it. Any
    /// failure is logged and reported as `false`.
    pub fn print_to_file<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        match File::create(path) {
            Ok(file) => write_to_sink(self, file, &path.display().to_string()),
            Err(err) => {
                error!(
                    "Could not write crass document to {}: {}",
                    path.display(),
                    DocumentError::from(err)
                );
                false
            }
        }
    }

    /// Write the document to standard output. Any failure is logged
    /// and reported as `false`.
    pub fn print_to_stdout(&self) -> bool {
        let stdout = io::stdout();
        let handle = stdout.lock();
        write_to_sink(self, handle, "standard output")
    }
}

/// Renders the same text `write_document` produces.
impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = document_bytes(self).map_err(|_| std::fmt::Error)?;
        // every byte is a Latin-1 code point
        let text: String = bytes.iter().map(|&b| char::from(b)).collect();
        write!(f, "{}", text)
    }
}
