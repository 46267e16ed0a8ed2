use std::fmt::Display;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::archive::ArchiveName;
use crate::detection::{EntryKind, Modification};
use crate::history::Watermark;

const NAME_COLUMN_WIDTH: usize = 30;

/// Human-readable run progress on standard output.
#[derive(Debug, Clone)]
pub struct Progress {
    root: PathBuf,
}

impl Progress {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn directory(&self, directory: &str, watermark: Watermark) {
        println!(
            "{} {:<width$} {} last processed",
            "## Dir".bold(),
            directory,
            watermark.to_string().cyan(),
            width = NAME_COLUMN_WIDTH
        );
    }

    pub fn modified(&self, modification: &Modification) {
        let kind = match modification.kind {
            EntryKind::Directory => "Dir",
            EntryKind::File => "File",
        };
        let path = modification
            .path
            .strip_prefix(&self.root)
            .unwrap_or(&modification.path);
        println!("---- {kind} {} was modified", path.display());
    }

    pub fn creating(&self, archive_name: &ArchiveName) {
        println!("---- Creating archive {}", archive_name.as_str().green());
    }

    pub fn failed(&self, archive_name: &ArchiveName, cause: &impl Display) {
        println!(
            "{} {archive_name} - {cause}",
            "Error in creating".red().bold()
        );
    }

    pub fn interrupted(&self, archive_name: &ArchiveName) {
        println!("{} {archive_name}", "Interrupt creating".yellow().bold());
    }
}
