use std::path::PathBuf;
use tracing::{info, Level};
use vbfedit::{export, list_pictures, list_sections, replace};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// lists the header entries and data blocks of a VBF file
    Sections {
        /// The VBF file
        vbf_file: PathBuf,
    },

    /// lists the pictures and their placement records
    List {
        /// The VBF file
        vbf_file: PathBuf,
    },

    /// exports pictures as BMP files
    Export {
        /// The VBF file
        vbf_file: PathBuf,

        /// The output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export the picture with this index
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// replaces a picture with an image file of the same size
    Replace {
        /// The VBF file
        vbf_file: PathBuf,
        /// Index of the picture (see `list`)
        index: usize,
        /// The replacement image
        img_file: PathBuf,
        /// The output file name, the VBF file is overwritten if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_file(true)
        .with_line_number(true)
        .init();

    match cli.command {
        Commands::Sections { vbf_file } => list_sections(&vbf_file)?,
        Commands::List { vbf_file } => list_pictures(&vbf_file)?,
        Commands::Export {
            vbf_file,
            output,
            index,
        } => {
            let output = match output {
                Some(o) => o,
                None => {
                    let Some(dir) = vbf_file.parent() else {
                        bail!("Invalid vbf file");
                    };
                    let Some(Some(filename)) = vbf_file.file_stem().map(|os| os.to_str()) else {
                        bail!("Invalid vbf file");
                    };
                    let output = dir.join(format!("{filename}_pictures"));
                    info!("output directory: {}", output.display());
                    output
                }
            };
            export(&vbf_file, &output, index)?;
        }
        Commands::Replace {
            vbf_file,
            index,
            img_file,
            output,
        } => {
            let output = output.unwrap_or_else(|| vbf_file.clone());
            replace(&vbf_file, index, &img_file, &output)?;
        }
    }
    Ok(())
}
