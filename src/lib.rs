//! Reading, writing and querying crass XML documents, which describe
//! CRISPR groups (direct repeats, spacers, flankers) and the contigs
//! assembled from them, plus the FASTA/FASTQ record model and the
//! glue for handing segment reads to an assembler.

pub mod assembly;
pub mod parser;
pub mod query;
pub mod seq;
pub mod writer;
pub mod xml;
