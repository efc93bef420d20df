use std::{error, fmt, io, path::PathBuf};

use bstr::ByteSlice;
use nom::error::ErrorKind;

pub type CrassParseResult<T> = Result<T, ParseError>;

/// Type encapsulating the different ways reading a crass document can
/// fail. The first five are raised by the path check before any byte
/// of the file is parsed.
#[derive(Debug)]
pub enum ParseError {
    /// The file, or one of the directories leading to it, does not
    /// exist.
    FileNotFound(PathBuf),
    /// The file or a directory on the way to it cannot be accessed.
    PermissionDenied(PathBuf),
    /// A component of the path prefix is not a directory.
    NotADirectoryComponent(PathBuf),
    /// Too many symbolic links were met while resolving the path.
    TooManySymlinks(PathBuf),
    /// The path, or one of its components, is longer than the
    /// platform allows.
    PathTooLong(PathBuf),
    /// The document is not well-formed XML. Includes the position of
    /// the problem and a description.
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// The document is well-formed but has no root element.
    EmptyDocument,
    /// Wrapper for an IO error.
    IOError(io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ParseError as PE;
        match self {
            PE::FileNotFound(p) => {
                write!(f, "File {} does not exist", p.display())
            }
            PE::PermissionDenied(p) => {
                write!(f, "Permission denied while accessing {}", p.display())
            }
            PE::NotADirectoryComponent(p) => write!(
                f,
                "A component of the path prefix of {} is not a directory",
                p.display()
            ),
            PE::TooManySymlinks(p) => write!(
                f,
                "Too many symbolic links encountered while resolving {}",
                p.display()
            ),
            PE::PathTooLong(p) => {
                write!(f, "File name {} is too long", p.display())
            }
            PE::Syntax {
                line,
                column,
                message,
            } => write!(
                f,
                "Failed to parse XML at line {}, column {}: {}",
                line, column, message
            ),
            PE::EmptyDocument => write!(f, "Document has no root element"),
            PE::IOError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl From<io::Error> for ParseError {
    #[inline]
    fn from(err: io::Error) -> Self {
        Self::IOError(err)
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ParseError::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl ParseError {
    /// Build a syntax error from the full input and the slice of it
    /// at which parsing failed.
    pub(crate) fn syntax(input: &[u8], rest: &[u8], message: &str) -> Self {
        let offset = (rest.as_ptr() as usize)
            .checked_sub(input.as_ptr() as usize)
            .filter(|&o| o <= input.len())
            .unwrap_or_else(|| input.len().saturating_sub(rest.len()));
        let consumed = &input[..offset];
        let line = consumed.iter().filter(|&&b| b == b'\n').count() + 1;
        let column = match consumed.rfind_byte(b'\n') {
            Some(nl) => offset - nl,
            None => offset + 1,
        };

        let snippet_end = rest
            .find_byte(b'\n')
            .unwrap_or_else(|| rest.len())
            .min(24);
        let snippet = rest[..snippet_end].to_str_lossy();

        let message = if snippet.is_empty() {
            message.to_string()
        } else {
            format!("{} (near `{}`)", message, snippet)
        };

        Self::Syntax {
            line,
            column,
            message,
        }
    }

    #[inline]
    pub fn is_path_error(&self) -> bool {
        use ParseError as PE;
        matches!(
            self,
            PE::FileNotFound(_)
                | PE::PermissionDenied(_)
                | PE::NotADirectoryComponent(_)
                | PE::TooManySymlinks(_)
                | PE::PathTooLong(_)
        )
    }
}

/// Error type threaded through the nom parsers. Keeps the remaining
/// input at the point of failure and the most specific description
/// available.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError<'a> {
    pub input: &'a [u8],
    pub message: String,
    described: bool,
}

impl<'a> SyntaxError<'a> {
    pub fn new(input: &'a [u8], message: impl Into<String>) -> Self {
        SyntaxError {
            input,
            message: message.into(),
            described: true,
        }
    }

    pub fn failure(input: &'a [u8], message: impl Into<String>) -> nom::Err<Self> {
        nom::Err::Failure(Self::new(input, message))
    }
}

impl<'a> nom::error::ParseError<&'a [u8]> for SyntaxError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        SyntaxError {
            input,
            message: kind.description().to_string(),
            described: false,
        }
    }

    fn append(_: &'a [u8], _: ErrorKind, other: Self) -> Self {
        other
    }

    // the innermost context wins
    fn add_context(_input: &'a [u8], ctx: &'static str, other: Self) -> Self {
        if other.described {
            other
        } else {
            SyntaxError::new(other.input, ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_position() {
        let input = b"<a>\n  <b>\n  </c>";
        let rest = &input[12..];
        match ParseError::syntax(input, rest, "mismatched closing tag") {
            ParseError::Syntax {
                line,
                column,
                message,
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, 3);
                assert_eq!(message, "mismatched closing tag (near `</c>`)");
            }
            _ => panic!("expected a syntax error"),
        }
    }

    #[test]
    fn path_errors() {
        assert!(ParseError::FileNotFound("x".into()).is_path_error());
        assert!(!ParseError::EmptyDocument.is_path_error());
    }
}
