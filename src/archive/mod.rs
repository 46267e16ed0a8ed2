mod archiver;

pub use archiver::{ArchiveError, ArchiveName, Archiver};
