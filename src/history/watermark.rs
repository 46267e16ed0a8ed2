use std::fmt;
use std::time::SystemTime;

use super::Timestamp;

/// Boundary below which changes of a directory are considered archived.
///
/// `Never` orders before every `ArchivedAt`, so a directory without history
/// counts as modified as soon as it has any entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Watermark {
    Never,
    ArchivedAt(Timestamp),
}

impl Watermark {
    /// Whether a modification at `modified` happened strictly after the watermark.
    ///
    /// The comparison keeps the sub-second part of `modified`, so a change made
    /// later within the archived second still qualifies.
    pub fn is_exceeded_by(&self, modified: SystemTime) -> bool {
        match self {
            Watermark::Never => true,
            Watermark::ArchivedAt(timestamp) => modified > timestamp.to_system_time(),
        }
    }
}

impl From<Option<Timestamp>> for Watermark {
    fn from(timestamp: Option<Timestamp>) -> Self {
        timestamp.map_or(Watermark::Never, Watermark::ArchivedAt)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Never => f.write_str("never"),
            Watermark::ArchivedAt(timestamp) => fmt::Display::fmt(timestamp, f),
        }
    }
}
