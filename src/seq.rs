pub mod fasta;
pub mod fastq;
pub mod iupac;

pub use self::fasta::FastaRecord;
pub use self::fastq::{FastqRecord, QualityEncoding};

use std::cmp::Ordering;
use std::io::{self, BufRead, Write};
use std::marker::PhantomData;
use std::ops::Range;
use std::{error, fmt};

use bstr::{BStr, BString};

/// Raised when a record cannot be read from a stream. Once one is
/// returned the stream should not be read from any further.
#[derive(Debug)]
pub enum FormatError {
    /// The record did not start with the expected marker byte.
    MissingMarker { expected: u8, found: Option<u8> },
    /// The header was directly followed by another record or the end
    /// of the stream. Includes the header.
    EmptySequence(BString),
    /// A FASTQ record has no `+` line after its sequence.
    MissingComment(BString),
    /// A FASTQ record has no quality string.
    EmptyQuality(BString),
    /// Wrapper for an IO error.
    IOError(io::Error),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FormatError as FE;
        match self {
            FE::MissingMarker { expected, found } => match found {
                Some(b) => write!(
                    f,
                    "Expected record to start with '{}', found '{}'",
                    char::from(*expected),
                    char::from(*b)
                ),
                None => write!(
                    f,
                    "Expected record to start with '{}', found end of input",
                    char::from(*expected)
                ),
            },
            FE::EmptySequence(h) => write!(f, "Record {} has no sequence", h),
            FE::MissingComment(h) => {
                write!(f, "Record {} is missing its '+' line", h)
            }
            FE::EmptyQuality(h) => {
                write!(f, "Record {} has no quality string", h)
            }
            FE::IOError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl From<io::Error> for FormatError {
    #[inline]
    fn from(err: io::Error) -> Self {
        Self::IOError(err)
    }
}

impl error::Error for FormatError {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BaseCounts {
    a: usize,
    c: usize,
    g: usize,
    t: usize,
}

impl BaseCounts {
    fn count(seq: &[u8]) -> Self {
        let mut counts = BaseCounts::default();
        for b in seq {
            match b.to_ascii_uppercase() {
                b'A' => counts.a += 1,
                b'C' => counts.c += 1,
                b'G' => counts.g += 1,
                b'T' => counts.t += 1,
                _ => (),
            }
        }
        counts
    }
}

/// Operations shared by FASTA and FASTQ records. Quality related
/// operations only exist on `FastqRecord`.
///
/// The floating point statistics divide by zero on empty sequences or
/// when the relevant bases are absent; a non-finite result means the
/// value is undefined.
pub trait SeqRecord: Sized + Clone {
    /// The byte each record starts with.
    const MARKER: u8;

    fn header(&self) -> &BStr;

    fn sequence(&self) -> &BStr;

    /// Read exactly one record, starting at the current position of
    /// the stream. On success the stream is left at the start of the
    /// next record.
    fn read<R: BufRead>(reader: &mut R) -> Result<Self, FormatError>;

    /// Write the record back in its text format, without a trailing
    /// newline.
    fn write<W: Write>(&self, out: &mut W) -> io::Result<()>;

    /// A new record with the same header, covering `len` bases from
    /// `start`, or everything from `start` if `len` is `None`. Both are
    /// clamped to the record.
    fn subsequence(&self, start: usize, len: Option<usize>) -> Self;

    fn reverse_complement(&self) -> Self;

    #[inline]
    fn len(&self) -> usize {
        self.sequence().len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.sequence().is_empty()
    }

    /// Everything from `start` to the end.
    fn truncate(&self, start: usize) -> Self {
        self.subsequence(start, None)
    }

    /// Compares the sequences only, byte-wise.
    fn seq_cmp(&self, other: &Self) -> Ordering {
        self.sequence().cmp(other.sequence())
    }

    /// Whichever of the record and its reverse complement has the
    /// lexicographically smaller sequence (the forward strand wins only
    /// when strictly smaller). The forward strand is taken in its
    /// normalised form, uppercase IUPAC, so that a record and its
    /// reverse complement share one canonical form.
    fn canonical(&self) -> Self {
        let rc = self.reverse_complement();
        let forward = rc.reverse_complement();
        if forward.seq_cmp(&rc) == Ordering::Less {
            forward
        } else {
            rc
        }
    }

    fn gc_content(&self) -> f64 {
        let counts = BaseCounts::count(self.sequence());
        (counts.g + counts.c) as f64 / self.len() as f64
    }

    fn at_content(&self) -> f64 {
        let counts = BaseCounts::count(self.sequence());
        (counts.a + counts.t) as f64 / self.len() as f64
    }

    fn gc_skew(&self) -> f64 {
        let counts = BaseCounts::count(self.sequence());
        (counts.g as f64 - counts.c as f64) / (counts.g + counts.c) as f64
    }

    fn at_skew(&self) -> f64 {
        let counts = BaseCounts::count(self.sequence());
        (counts.a as f64 - counts.t as f64) / (counts.a + counts.t) as f64
    }

    /// GC content as a rounded percentage; 0 when undefined.
    fn gc_percent(&self) -> u32 {
        (self.gc_content() * 100.0).round() as u32
    }

    /// AT content as a rounded percentage; 0 when undefined.
    fn at_percent(&self) -> u32 {
        (self.at_content() * 100.0).round() as u32
    }
}

/// Iterates over the records of a stream until it is exhausted. Stops
/// for good after the first error.
pub struct FastxReader<R, T> {
    reader: R,
    failed: bool,
    _record: PhantomData<T>,
}

impl<R: BufRead, T: SeqRecord> FastxReader<R, T> {
    pub fn new(reader: R) -> Self {
        FastxReader {
            reader,
            failed: false,
            _record: PhantomData,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead, T: SeqRecord> Iterator for FastxReader<R, T> {
    type Item = Result<T, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let res = match peek_non_whitespace(&mut self.reader) {
            Ok(None) => return None,
            Ok(Some(_)) => T::read(&mut self.reader),
            Err(err) => Err(err.into()),
        };
        self.failed = res.is_err();
        Some(res)
    }
}

pub(crate) fn clamp_range(len: usize, start: usize, count: Option<usize>) -> Range<usize> {
    let start = start.min(len);
    let end = match count {
        Some(n) => start.saturating_add(n).min(len),
        None => len,
    };
    start..end
}

/// Skip whitespace and return the next byte without consuming it, or
/// `None` at the end of the stream.
pub(crate) fn peek_non_whitespace<R: BufRead>(reader: &mut R) -> io::Result<Option<u8>> {
    loop {
        let (skip, found) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(p) => (p, Some(buf[p])),
                None => (buf.len(), None),
            }
        };
        reader.consume(skip);
        if found.is_some() {
            return Ok(found);
        }
    }
}

/// Append the bytes up to the next whitespace or the end of the stream.
fn read_token<R: BufRead>(reader: &mut R, out: &mut Vec<u8>) -> io::Result<()> {
    loop {
        let (used, done) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|b| b.is_ascii_whitespace()) {
                Some(p) => {
                    out.extend_from_slice(&buf[..p]);
                    (p, true)
                }
                None => {
                    out.extend_from_slice(buf);
                    (buf.len(), false)
                }
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

/// Read the next whitespace delimited token.
pub(crate) fn next_token<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut token = Vec::new();
    if peek_non_whitespace(reader)?.is_some() {
        read_token(reader, &mut token)?;
    }
    Ok(token)
}

/// Concatenate whitespace separated tokens for as long as `more`
/// accepts the first byte of the upcoming token, given what has been
/// collected so far.
pub(crate) fn concat_tokens<R, F>(reader: &mut R, mut more: F) -> io::Result<Vec<u8>>
where
    R: BufRead,
    F: FnMut(u8, &[u8]) -> bool,
{
    let mut out = Vec::new();
    while let Some(next) = peek_non_whitespace(reader)? {
        if !more(next, &out) {
            break;
        }
        read_token(reader, &mut out)?;
    }
    Ok(out)
}

/// Consume the byte `expected` if it is the next non-whitespace byte.
pub(crate) fn expect_marker<R: BufRead>(reader: &mut R, expected: u8) -> Result<(), FormatError> {
    match peek_non_whitespace(reader)? {
        Some(b) if b == expected => {
            reader.consume(1);
            Ok(())
        }
        found => Err(FormatError::MissingMarker { expected, found }),
    }
}

/// The rest of the current line, without its line terminator.
pub(crate) fn rest_of_line<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    while line.last().map_or(false, |b| *b == b'\n' || *b == b'\r') {
        line.pop();
    }
    Ok(line)
}
