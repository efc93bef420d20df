use std::fmt;
use std::io::{self, BufRead, Write};

use bstr::{BStr, BString, ByteSlice};

use super::{clamp_range, concat_tokens, expect_marker, iupac, next_token};
use super::{FormatError, SeqRecord};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// A FASTA record. Sequence lines are joined on reading, so the
/// sequence holds no whitespace.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct FastaRecord {
    pub header: BString,
    pub sequence: BString,
}

impl FastaRecord {
    pub fn new(header: &[u8], sequence: &[u8]) -> Self {
        FastaRecord {
            header: header.into(),
            sequence: sequence.into(),
        }
    }
}

impl SeqRecord for FastaRecord {
    const MARKER: u8 = b'>';

    #[inline]
    fn header(&self) -> &BStr {
        self.header.as_bstr()
    }

    #[inline]
    fn sequence(&self) -> &BStr {
        self.sequence.as_bstr()
    }

    fn read<R: BufRead>(reader: &mut R) -> Result<Self, FormatError> {
        expect_marker(reader, Self::MARKER)?;
        let header = BString::from(next_token(reader)?);
        let sequence = concat_tokens(reader, |b, _| b != Self::MARKER)?;
        if sequence.is_empty() {
            return Err(FormatError::EmptySequence(header));
        }
        Ok(FastaRecord {
            header,
            sequence: sequence.into(),
        })
    }

    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&[Self::MARKER])?;
        out.write_all(&self.header)?;
        out.write_all(b"\n")?;
        out.write_all(&self.sequence)
    }

    fn subsequence(&self, start: usize, len: Option<usize>) -> Self {
        let range = clamp_range(self.sequence.len(), start, len);
        FastaRecord::new(&self.header, &self.sequence[range])
    }

    fn reverse_complement(&self) -> Self {
        FastaRecord {
            header: self.header.clone(),
            sequence: iupac::reverse_complement(&self.sequence).into(),
        }
    }
}

impl fmt::Display for FastaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{}\n{}", self.header, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_stops_at_next_record() {
        let mut input = Cursor::new(&b">h1\nACGT\n>h2\nTTTT"[..]);
        let first = FastaRecord::read(&mut input).unwrap();
        assert_eq!(first.header(), "h1");
        assert_eq!(first.sequence(), "ACGT");

        let second = FastaRecord::read(&mut input).unwrap();
        assert_eq!(second.header(), "h2");
        assert_eq!(second.sequence(), "TTTT");
    }

    #[test]
    fn read_joins_lines() {
        let mut input = Cursor::new(&b"\n>multi\r\nAC\r\nGT\r\nNN\n"[..]);
        let rec = FastaRecord::read(&mut input).unwrap();
        assert_eq!(rec.sequence(), "ACGTNN");
        assert_eq!(rec.len(), 6);
    }

    #[test]
    fn read_errors() {
        let mut input = Cursor::new(&b"ACGT\n"[..]);
        assert!(matches!(
            FastaRecord::read(&mut input),
            Err(FormatError::MissingMarker {
                expected: b'>',
                found: Some(b'A')
            })
        ));

        let mut input = Cursor::new(&b">h1\n>h2\nAC\n"[..]);
        match FastaRecord::read(&mut input) {
            Err(FormatError::EmptySequence(h)) => assert_eq!(h, "h1"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn write_and_display() {
        let rec = FastaRecord::new(b"r1", b"ACGT");
        let mut out = Vec::new();
        rec.write(&mut out).unwrap();
        assert_eq!(out, b">r1\nACGT".to_vec());
        assert_eq!(rec.to_string(), ">r1\nACGT");
    }

    #[test]
    fn subsequences() {
        let rec = FastaRecord::new(b"r", b"AACCGGTT");
        assert_eq!(rec.subsequence(2, Some(4)).sequence(), "CCGG");
        assert_eq!(rec.subsequence(6, Some(10)).sequence(), "TT");
        assert_eq!(rec.truncate(5).sequence(), "GTT");
        assert!(rec.truncate(20).is_empty());
        assert_eq!(rec.subsequence(0, None).header(), "r");
    }

    #[test]
    fn canonical_form() {
        let rec = FastaRecord::new(b"r", b"TTGC");
        let rc = rec.reverse_complement();
        assert_eq!(rc.sequence(), "GCAA");
        assert_eq!(rc.reverse_complement(), rec);
        assert_eq!(rec.canonical().sequence(), "GCAA");
        assert_eq!(rc.canonical(), rc);
        assert_eq!(rec.canonical().canonical(), rec.canonical());
        assert_eq!(rec.seq_cmp(&rc), std::cmp::Ordering::Greater);
    }
}
