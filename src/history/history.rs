use hashlink::LinkedHashMap;

use super::{Timestamp, Watermark};

/// Last archival time of every directory seen in a previous run.
///
/// Entries keep the order in which they were first recorded, so a saved
/// history lists directories the way it was loaded, with new ones appended.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: LinkedHashMap<String, Timestamp>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, directory: &str) -> Option<Timestamp> {
        self.entries.get(directory).copied()
    }

    pub fn watermark(&self, directory: &str) -> Watermark {
        self.get(directory).into()
    }

    /// Stores `archived_at` as the new watermark of `directory`.
    pub fn record(&mut self, directory: impl Into<String>, archived_at: Timestamp) {
        let directory = directory.into();
        match self.entries.get_mut(&directory) {
            Some(existing) => *existing = archived_at,
            None => {
                self.entries.insert(directory, archived_at);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Timestamp)> {
        self.entries
            .iter()
            .map(|(directory, timestamp)| (directory.as_str(), *timestamp))
    }
}

impl FromIterator<(String, Timestamp)> for History {
    fn from_iter<T: IntoIterator<Item = (String, Timestamp)>>(iter: T) -> Self {
        let mut history = History::new();
        for (directory, timestamp) in iter {
            history.record(directory, timestamp);
        }
        history
    }
}
