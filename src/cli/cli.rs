use std::path::PathBuf;

use clap::Parser;

use crate::cli::LogLevel;

/// Archives every changed subdirectory of the working directory into
/// `z-backup-<name>.tar.gz`.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Directory whose subdirectories are archived
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,
}
