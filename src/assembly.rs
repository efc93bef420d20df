//! Runs an external assembler over the spacer segments of one group.
//!
//! The crass document names the spacers that make up the wanted contigs
//! of a group. Their reads live in one FASTA file per spacer; those files
//! are concatenated into a single input and handed to the assembler.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use fnv::FnvHashSet;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use crate::parser::parse_file;
use crate::query::extract_assembly_inputs;

pub const DEFAULT_KMER: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assembler {
    Velvet,
    Cap3,
}

impl Assembler {
    pub fn name(&self) -> &'static str {
        match self {
            Assembler::Velvet => "velvet",
            Assembler::Cap3 => "cap3",
        }
    }

    /// The commands to run, in order, to assemble `input`.
    pub fn commands(&self, opts: &AssemblyOptions, input: &Path) -> Vec<Command> {
        match self {
            Assembler::Velvet => {
                let mut velveth = Command::new("velveth");
                velveth
                    .arg(&opts.output_dir)
                    .arg(opts.kmer.to_string())
                    .arg("-fasta")
                    .arg(if opts.paired_end {
                        "-shortPaired"
                    } else {
                        "-short"
                    })
                    .arg(input);

                let mut velvetg = Command::new("velvetg");
                velvetg.arg(&opts.output_dir);
                if let (true, Some(size)) = (opts.paired_end, opts.insert_size) {
                    velvetg.arg("-ins_length").arg(size.to_string());
                }
                vec![velveth, velvetg]
            }
            Assembler::Cap3 => {
                let mut cap3 = Command::new("cap3");
                cap3.arg(input);
                vec![cap3]
            }
        }
    }
}

impl fmt::Display for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    /// The crass document describing the groups.
    pub xml: PathBuf,
    pub group: String,
    /// Ids of the contigs to assemble.
    pub segments: FnvHashSet<String>,
    /// Where the per-spacer FASTA files are.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub paired_end: bool,
    pub insert_size: Option<u32>,
    pub kmer: u32,
    pub assembler: Assembler,
}

/// Parse a comma separated list of contig ids.
pub fn parse_segment_list(list: &str) -> Result<FnvHashSet<String>> {
    lazy_static! {
        static ref RE_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").unwrap();
    }

    let mut segments = FnvHashSet::default();
    for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !RE_SEGMENT.is_match(id) {
            bail!("Invalid segment id: {:?}", id);
        }
        segments.insert(id.to_string());
    }
    if segments.is_empty() {
        bail!("No segment ids in {:?}", list);
    }
    Ok(segments)
}

/// File holding the reads of one spacer.
pub fn segment_file_name(gid: &str, spid: &str) -> String {
    format!("Group_{}_{}.fa", gid, spid)
}

/// Concatenate the segment file of every distinct spacer into `dest`,
/// in order of first occurrence. Returns the number of files copied.
pub fn concatenate_segments(
    input_dir: &Path,
    gid: &str,
    spacer_ids: &[String],
    dest: &Path,
) -> Result<usize> {
    let file = File::create(dest)
        .with_context(|| format!("Could not create {}", dest.display()))?;
    let mut out = BufWriter::new(file);

    let mut seen = FnvHashSet::default();
    for spid in spacer_ids {
        if !seen.insert(spid.as_str()) {
            continue;
        }
        let path = input_dir.join(segment_file_name(gid, spid));
        let mut segment = File::open(&path)
            .with_context(|| format!("Could not open segment {}", path.display()))?;
        let bytes = io::copy(&mut segment, &mut out)?;
        debug!("Copied {} bytes from {}", bytes, path.display());
    }
    out.flush()?;
    Ok(seen.len())
}

/// Extract the spacers of the wanted contigs, concatenate their reads
/// and run the assembler. Returns the path of the concatenated input.
pub fn run_assembly(opts: &AssemblyOptions) -> Result<PathBuf> {
    let doc = parse_file(&opts.xml)
        .with_context(|| format!("Could not load {}", opts.xml.display()))?;
    let inputs = extract_assembly_inputs(&doc, &opts.group, &opts.segments)?;
    if inputs.spacer_ids.is_empty() {
        bail!(
            "None of the requested contigs of group {} have spacers",
            opts.group
        );
    }

    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("Could not create {}", opts.output_dir.display()))?;
    let input = opts
        .output_dir
        .join(format!("Group_{}_{}.fa", opts.group, opts.assembler));
    let count = concatenate_segments(&opts.input_dir, &opts.group, &inputs.spacer_ids, &input)?;
    info!(
        "Group {} (DR {}): {} segment files written to {}",
        opts.group,
        inputs.direct_repeat,
        count,
        input.display()
    );

    for mut cmd in opts.assembler.commands(opts, &input) {
        let program = cmd.get_program().to_string_lossy().into_owned();
        debug!("Running {:?}", cmd);
        let status = cmd
            .status()
            .with_context(|| format!("Could not start {}", program))?;
        if !status.success() {
            bail!("{} exited with {}", program, status);
        }
        info!("{} finished", program);
    }
    Ok(input)
}
