//! In-memory state store

use std::sync::{Arc, Mutex};

use dial_core::{PersistedRecord, StateStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    record: Option<PersistedRecord>,
    saves: usize,
    failing: bool,
}

/// State store that never touches the disk
///
/// Clones share the same record, so a test can keep one clone to inspect
/// what the switcher saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a record
    pub fn with_record(record: PersistedRecord) -> Self {
        let store = Self::default();
        store.lock().record = Some(record);
        store
    }

    /// Last saved record, if any
    pub fn record(&self) -> Option<PersistedRecord> {
        self.lock().record
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    /// Make saves fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> PersistedRecord {
        self.lock().record.unwrap_or_default()
    }

    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing {
            return Err(StoreError::Io(std::io::Error::other(
                "simulated store fault",
            )));
        }
        inner.record = Some(*record);
        inner.saves += 1;
        Ok(())
    }
}
