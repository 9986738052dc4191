pub mod report;

use crate::analysis::search::{DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for neuroimg
#[derive(Parser, Debug)]
#[command(name = "neuroimg")]
#[command(about = "DICOM folder and DICOMDIR ingestion tool")]
#[command(version)]
pub struct Cli {
    /// Directory holding the document store
    #[arg(short, long, global = true, default_value = "neuroimg-store")]
    pub store: PathBuf,

    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a DICOM folder, DICOMDIR or single file
    Ingest {
        /// Folder, DICOMDIR or file to ingest
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Decode threads (overrides the configuration)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Summarize MRI sequence coverage of the stored studies
    Analyze {
        /// Also write the report to this file
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Fuzzy search over stored patients, studies and series
    Search {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Maximum number of hits
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Minimum score (0-100) a hit needs
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u8,
    },

    /// List the files of a series in instance order
    Files {
        #[arg(value_name = "SERIES_UID")]
        series_uid: String,
    },
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Progress bar and a text summary
    Text,
    /// One JSON event per line
    Json,
}
