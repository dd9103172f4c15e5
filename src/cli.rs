use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_SEGMENTS;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to download
    #[arg(index = 1)]
    pub url: String,

    /// Output file path (overrides --download-dir)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Directory to save the file in (defaults to the home directory)
    #[arg(short = 'd', long = "download-dir")]
    pub download_dir: Option<PathBuf>,

    /// Number of byte-range segments fetched in parallel
    #[arg(short = 's', long, default_value_t = DEFAULT_SEGMENTS)]
    pub segments: usize,

    /// Give up waiting for the download after this many seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// How to print the final report
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
