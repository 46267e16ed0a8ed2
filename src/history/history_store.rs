use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use compio::fs;
use snafu::prelude::*;
use tracing::{debug, info};

use super::{History, TimestampParseError};

pub const HISTORY_FILE_NAME: &str = "archive-history.xml";

/// Reads and writes the archive history kept beside the archived directories.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn in_dir(root: &Path) -> Self {
        Self {
            path: root.join(HISTORY_FILE_NAME),
        }
    }

    /// Loads the history, or an empty one when no history file exists yet.
    pub async fn load(&self) -> Result<History, HistoryLoadError> {
        debug!("Reading archive history from {}", self.path.display());
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No existing archive history found, starting fresh");
                return Ok(History::default());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    path: self.path.clone(),
                });
            }
        };

        let contents = String::from_utf8(bytes).context(InvalidEncodingSnafu)?;
        History::try_from(contents.as_str())
    }

    /// Replaces the history file with `history`.
    pub async fn save(&self, history: &History) -> Result<(), HistorySaveError> {
        let bytes = history.to_xml().context(SerializeSnafu)?;
        fs::write(&self.path, bytes)
            .await
            .0
            .context(WriteSnafu {
                path: self.path.clone(),
            })?;
        info!(
            "Saved {} archive history entries to {}",
            history.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum HistoryLoadError {
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadError { path: PathBuf, source: io::Error },
    #[snafu(display("Invalid format {HISTORY_FILE_NAME} - not valid UTF-8"))]
    InvalidEncodingError { source: FromUtf8Error },
    #[snafu(display("Invalid format {HISTORY_FILE_NAME} - {source}"))]
    MalformedXmlError { source: quick_xml::Error },
    #[snafu(display("Invalid format {HISTORY_FILE_NAME} - document ends inside an element"))]
    TruncatedDocument,
    #[snafu(display("Invalid format {HISTORY_FILE_NAME} - text outside the root element"))]
    ContentOutsideRoot,
    #[snafu(display("Invalid root elements <archive> in metadata file: found {found}"))]
    RootElementCount { found: usize },
    #[snafu(display("Lack of version attribute in metadata file"))]
    MissingVersion,
    #[snafu(display("Missing name attribute for directory element #{position}"))]
    MissingName { position: usize },
    #[snafu(display("Missing lastArchivized attribute for directory {directory}"))]
    MissingLastArchivized { directory: String },
    #[snafu(display("Invalid value [{value}] for attribute lastArchivized: {source}"))]
    InvalidTimestampError {
        value: String,
        source: TimestampParseError,
    },
}

impl HistoryLoadError {
    /// True when the history file exists but its contents cannot be trusted.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, HistoryLoadError::ReadError { .. })
    }
}

#[derive(Debug, Snafu)]
pub enum HistorySaveError {
    #[snafu(display("Failed to serialize the archive history"))]
    SerializeError { source: quick_xml::Error },
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    WriteError { path: PathBuf, source: io::Error },
}
