use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};

use crass::assembly::{self, Assembler, AssemblyOptions, DEFAULT_KMER};
use crass::parser::parse_file;
use crass::query::dump_groups;

#[derive(Parser)]
#[command(
    version,
    about = "Assemble the spacers of a crass group with velvet or cap3",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble with velveth and velvetg
    #[command(arg_required_else_help = true)]
    Velvet(AssemblyArgs),
    /// Assemble with cap3
    #[command(arg_required_else_help = true)]
    Cap3(AssemblyArgs),
    /// Print the read file name of every group in a crass document
    #[command(arg_required_else_help = true)]
    Dump {
        /// the crass XML document
        xml: PathBuf,
    },
}

#[derive(Args)]
struct AssemblyArgs {
    /// the crass XML document
    #[arg(short, long)]
    xml: PathBuf,

    /// id of the group to assemble
    #[arg(short, long)]
    group: String,

    /// comma separated ids of the contigs to assemble
    #[arg(short, long)]
    segments: String,

    /// directory holding the Group_<gid>_<spid>.fa files
    #[arg(short, long, default_value = ".")]
    input_dir: PathBuf,

    /// directory for the assembler output
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// treat the reads as paired end
    #[arg(short, long)]
    paired_end: bool,

    /// insert size of the read pairs
    #[arg(short = 'I', long)]
    insert_size: Option<u32>,

    /// hash length for velvet
    #[arg(short, long, default_value_t = DEFAULT_KMER)]
    kmer: u32,
}

impl AssemblyArgs {
    fn into_options(self, assembler: Assembler) -> Result<AssemblyOptions> {
        let segments = assembly::parse_segment_list(&self.segments)?;
        Ok(AssemblyOptions {
            xml: self.xml,
            group: self.group,
            segments,
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            paired_end: self.paired_end,
            insert_size: self.insert_size,
            kmer: self.kmer,
            assembler,
        })
    }
}

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Velvet(args) => {
            let opts = args.into_options(Assembler::Velvet)?;
            let input = assembly::run_assembly(&opts)?;
            info!("Assembled {} with velvet", input.display());
        }
        Commands::Cap3(args) => {
            let opts = args.into_options(Assembler::Cap3)?;
            let input = assembly::run_assembly(&opts)?;
            info!("Assembled {} with cap3", input.display());
        }
        Commands::Dump { xml } => {
            let doc = parse_file(&xml)
                .with_context(|| format!("Could not load {}", xml.display()))?;
            let stdout = std::io::stdout();
            dump_groups(&doc, &mut stdout.lock())?;
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));
        std::process::exit(1);
    }
}
