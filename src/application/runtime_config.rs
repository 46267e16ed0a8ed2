use std::path::PathBuf;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory whose subdirectories are archived; also holds the history
    /// file and the archives.
    pub root: PathBuf,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self { root: cli.root }
    }
}
