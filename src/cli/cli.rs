use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Browse a directory hierarchy through the tree cache and print what was loaded.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directories to expand after the initial load
    pub targets: Vec<String>,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// The root directory of the project
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Serve the hierarchy from a YAML fixture instead of the filesystem
    #[clap(long, short)]
    pub fixture: Option<PathBuf>,

    /// How many levels to expand below the roots
    #[clap(long, short, default_value_t = 0)]
    pub depth: usize,

    #[clap(long)]
    pub no_color: bool,
}
