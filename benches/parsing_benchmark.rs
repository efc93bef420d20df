use std::io::Cursor;

use fnv::FnvHashSet;

use crass::parser::parse_bytes;
use crass::query::extract_assembly_inputs;
use crass::seq::{FastaRecord, FastxReader, SeqRecord};
use crass::writer::document_bytes;
use crass::xml::{Document, SpacerSide, Tag};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_document(groups: usize, spacers: usize) -> Document {
    let mut doc = Document::crass("1.0").unwrap();
    for g in 0..groups {
        let gid = g.to_string();
        let group = doc.add_group(&gid, "GTTTCAATCCACGCGCCCACGCGGATGAAAC");
        let data = group.add_data();
        data.first_child_mut(&Tag::Drs)
            .unwrap()
            .add_direct_repeat("DR1", "GTTTCAATCCACGCGCCCACGCGGATGAAAC");
        let spacer_list = data.first_child_mut(&Tag::Spacers).unwrap();
        for s in 0..spacers {
            let spid = format!("SP{}", s);
            spacer_list.add_spacer(&spid, "ACGTTGCAACGTAGCTAGCATCGATCGAT", Some(2.5));
        }

        let assembly = group.add_assembly();
        let contig = assembly.add_contig("C1", Some(10.0));
        contig.create_consensus("ACGTTGCAACGTAGCTAGCATCGATCGATGTTTCAATCC");
        for s in 0..spacers {
            let cspacer = contig.add_spacer_to_contig(&format!("SP{}", s));
            cspacer.create_spacers(SpacerSide::Forward);
        }
    }
    doc
}

fn synthetic_fasta(records: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..records {
        out.extend_from_slice(format!(">read{}\n", i).as_bytes());
        out.extend_from_slice(b"ACGTTGCAACGTAGCTAGCATCGATCGATGTTTCAATCC\nGGATCC\n");
    }
    out
}

macro_rules! bench_document {
    ($name:ident, $groups:literal, $spacers:literal) => {
        fn $name(c: &mut Criterion) {
            let bytes = document_bytes(&synthetic_document($groups, $spacers)).unwrap();
            let id = format!("{}x{}", $groups, $spacers);
            c.bench_with_input(BenchmarkId::new("parse", &id), &bytes, |b, bytes| {
                b.iter(|| parse_bytes(bytes).unwrap());
            });

            let doc = parse_bytes(&bytes).unwrap();
            let wanted: FnvHashSet<String> = Some("C1".to_string()).into_iter().collect();
            let gid = ($groups - 1).to_string();
            c.bench_with_input(BenchmarkId::new("extract", &id), &doc, |b, doc| {
                b.iter(|| extract_assembly_inputs(doc, &gid, &wanted).unwrap());
            });
        }
    };
}

bench_document!(small_document, 10, 10);
bench_document!(large_document, 500, 40);

fn fasta_records(c: &mut Criterion) {
    let input = synthetic_fasta(5000);
    c.bench_with_input(BenchmarkId::new("fasta", 5000), &input, |b, input| {
        b.iter(|| {
            let reader: FastxReader<_, FastaRecord> = FastxReader::new(Cursor::new(input));
            reader.map(|r| r.unwrap().gc_content()).sum::<f64>()
        });
    });
}

criterion_group!(
    name = document_benches;
    config = Criterion::default().sample_size(25);
    targets = small_document, large_document
);

criterion_group!(
    name = record_benches;
    config = Criterion::default().sample_size(25);
    targets = fasta_records
);

criterion_main!(document_benches, record_benches);
