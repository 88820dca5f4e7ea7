use super::{ProcessRecord, StateStore};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// In-process record store, mostly for tests.
///
/// Keeps every write so tests can assert on the exact transition sequence.
#[derive(Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, ProcessRecord>>,
    history: Mutex<Vec<(String, ProcessRecord)>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written for `name`, oldest first.
    pub fn history(&self, name: &str) -> Vec<ProcessRecord> {
        self.history
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, r)| *r)
            .collect()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, name: &str) -> Result<ProcessRecord> {
        self.records
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))
    }

    fn write(&self, name: &str, record: ProcessRecord) -> Result<()> {
        let mut records = self.records.lock();
        records.insert(name.to_string(), record);
        self.history.lock().push((name.to_string(), record));
        Ok(())
    }

    fn location(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}
