use std::fmt;
use std::io::{self, BufRead, Write};

use bstr::{BStr, BString, ByteSlice};

use super::{clamp_range, concat_tokens, expect_marker, iupac, next_token, peek_non_whitespace};
use super::{rest_of_line, FormatError, SeqRecord};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// How Phred scores are stored as characters.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityEncoding {
    /// Offset 33, scores 0 to 93.
    Sanger,
    /// Offset 64, scores 0 to 62.
    Illumina,
}

impl QualityEncoding {
    #[inline]
    pub fn offset(self) -> u8 {
        match self {
            QualityEncoding::Sanger => 33,
            QualityEncoding::Illumina => 64,
        }
    }

    #[inline]
    pub fn max_score(self) -> u8 {
        match self {
            QualityEncoding::Sanger => 93,
            QualityEncoding::Illumina => 62,
        }
    }
}

impl Default for QualityEncoding {
    fn default() -> Self {
        QualityEncoding::Sanger
    }
}

/// A FASTQ record. The comment is whatever follows the `+` on its
/// line, and the quality characters are interpreted according to
/// `encoding`.
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct FastqRecord {
    pub header: BString,
    pub sequence: BString,
    pub comment: BString,
    pub quality: BString,
    pub encoding: QualityEncoding,
}

impl FastqRecord {
    pub fn new(header: &[u8], sequence: &[u8], comment: &[u8], quality: &[u8]) -> Self {
        FastqRecord {
            header: header.into(),
            sequence: sequence.into(),
            comment: comment.into(),
            quality: quality.into(),
            encoding: QualityEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: QualityEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[inline]
    pub fn comment(&self) -> &BStr {
        self.comment.as_bstr()
    }

    #[inline]
    pub fn quality(&self) -> &BStr {
        self.quality.as_bstr()
    }

    /// The numeric Phred score of every quality character. Characters
    /// below the encoding's offset give 0.
    pub fn phred_scores(&self) -> Vec<u8> {
        let offset = self.encoding.offset();
        self.quality.iter().map(|q| q.saturating_sub(offset)).collect()
    }

    /// Replace the quality string with the given Phred scores, clamping
    /// each to the range of the current encoding.
    pub fn set_phred_scores(&mut self, scores: &[u8]) {
        let offset = self.encoding.offset();
        let max = self.encoding.max_score();
        let quality: Vec<u8> = scores.iter().map(|s| (*s).min(max) + offset).collect();
        self.quality = quality.into();
    }

    /// Re-encode the quality string in place, shifting every character
    /// by the difference between the two offsets.
    pub fn convert_encoding(&mut self, target: QualityEncoding) {
        use QualityEncoding as QE;
        let shift = QE::Illumina.offset() - QE::Sanger.offset();
        match (self.encoding, target) {
            (QE::Sanger, QE::Illumina) => {
                self.quality.iter_mut().for_each(|q| *q = q.saturating_add(shift))
            }
            (QE::Illumina, QE::Sanger) => {
                self.quality.iter_mut().for_each(|q| *q = q.saturating_sub(shift))
            }
            _ => (),
        }
        self.encoding = target;
    }
}

impl SeqRecord for FastqRecord {
    const MARKER: u8 = b'@';

    #[inline]
    fn header(&self) -> &BStr {
        self.header.as_bstr()
    }

    #[inline]
    fn sequence(&self) -> &BStr {
        self.sequence.as_bstr()
    }

    /// The comment is the whole rest of the `+` line, spaces included.
    /// Quality tokens are then joined until the quality is as long as
    /// the sequence. A token starting with `@` or `+` only ends the
    /// quality once something has been read, so `@III` directly after
    /// the `+` line is a quality string, not the next record.
    fn read<R: BufRead>(reader: &mut R) -> Result<Self, FormatError> {
        expect_marker(reader, Self::MARKER)?;
        let header = BString::from(next_token(reader)?);

        let sequence = concat_tokens(reader, |b, _| b != b'+' && b != Self::MARKER)?;
        if sequence.is_empty() {
            return Err(FormatError::EmptySequence(header));
        }

        if peek_non_whitespace(reader)? != Some(b'+') {
            return Err(FormatError::MissingComment(header));
        }
        reader.consume(1);
        let comment = rest_of_line(reader)?;

        // '@' and '+' are valid quality characters, so they only end the
        // quality string once something has been read.
        let seq_len = sequence.len();
        let quality = concat_tokens(reader, |b, qual| {
            qual.len() < seq_len && (qual.is_empty() || (b != Self::MARKER && b != b'+'))
        })?;
        if quality.is_empty() {
            return Err(FormatError::EmptyQuality(header));
        }

        Ok(FastqRecord {
            header,
            sequence: sequence.into(),
            comment: comment.into(),
            quality: quality.into(),
            encoding: QualityEncoding::default(),
        })
    }

    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&[Self::MARKER])?;
        out.write_all(&self.header)?;
        out.write_all(b"\n")?;
        out.write_all(&self.sequence)?;
        out.write_all(b"\n+")?;
        out.write_all(&self.comment)?;
        out.write_all(b"\n")?;
        out.write_all(&self.quality)
    }

    fn subsequence(&self, start: usize, len: Option<usize>) -> Self {
        let range = clamp_range(self.sequence.len(), start, len);
        let qual_range = clamp_range(self.quality.len(), range.start, Some(range.len()));
        FastqRecord {
            header: self.header.clone(),
            sequence: BString::from(&self.sequence[range]),
            comment: self.comment.clone(),
            quality: BString::from(&self.quality[qual_range]),
            encoding: self.encoding,
        }
    }

    fn reverse_complement(&self) -> Self {
        let quality: Vec<u8> = self.quality.iter().rev().copied().collect();
        FastqRecord {
            header: self.header.clone(),
            sequence: iupac::reverse_complement(&self.sequence).into(),
            comment: self.comment.clone(),
            quality: quality.into(),
            encoding: self.encoding,
        }
    }
}

impl fmt::Display for FastqRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{}\n{}\n+{}\n{}",
            self.header, self.sequence, self.comment, self.quality
        )
    }
}
