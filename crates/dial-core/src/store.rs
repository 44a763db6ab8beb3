//! Persisted switcher state
//!
//! Only the tuner's step index and the selected source survive a restart.
//! The channel is always re-read from the dial, so it is never stored.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Video source routed to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// HDMI passthrough
    Hdmi,
    /// Composite / RF path through the tuner
    Composite,
}

impl Source {
    /// Source relay level that selects this source (LOW = HDMI)
    pub fn relay_level(&self) -> bool {
        match self {
            Self::Hdmi => false,
            Self::Composite => true,
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hdmi => "HDMI",
            Self::Composite => "Composite",
        }
    }
}

/// On-disk mirror of the resumable part of the switcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Last tuner step index the relays moved to
    pub frequency: i32,
    /// Last selected source, if one was ever recorded
    #[serde(default)]
    pub source: Option<Source>,
}

impl PersistedRecord {
    /// Create a record
    pub fn new(frequency: i32, source: Option<Source>) -> Self {
        Self { frequency, source }
    }
}

/// Load/save the persisted record
///
/// `load` never fails: a missing or unreadable record yields the default
/// so that boot never depends on persistence.
pub trait StateStore: Send {
    /// Load the last saved record, or the default
    fn load(&self) -> PersistedRecord;

    /// Save a record without ever leaving a torn copy behind
    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError>;
}

impl<T: StateStore + ?Sized> StateStore for Box<T> {
    fn load(&self) -> PersistedRecord {
        (**self).load()
    }

    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        (**self).save(record)
    }
}

/// JSON file store with write-then-rename replacement
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file used for atomic replacement
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> PersistedRecord {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!("No state at {}: {}", self.path.display(), e);
                return PersistedRecord::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Ignoring unreadable state at {}: {}",
                    self.path.display(),
                    e
                );
                PersistedRecord::default()
            }
        }
    }

    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(record)?;
        let tmp = self.temp_path();

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(
            "Saved state {:?} to {}",
            record,
            self.path.display()
        );
        Ok(())
    }
}
