//! Persistent record of when each directory was last archived.

mod history;
mod history_store;
mod history_xml;
mod timestamp;
mod watermark;

pub use history::History;
pub use history_store::{HISTORY_FILE_NAME, HistoryLoadError, HistorySaveError, HistoryStore};
pub use timestamp::{Timestamp, TimestampParseError};
pub use watermark::Watermark;
