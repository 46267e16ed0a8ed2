mod change_detector;

pub use change_detector::{DetectionError, EntryKind, Modification, is_modified_after};
