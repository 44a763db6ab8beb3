//! Static position → channel lookup table
//!
//! The rotary encoder reports a raw position. Each detent of the dial maps to
//! a logical channel, and several positions may alias the same channel (the
//! encoder wraps around between 39 and 0, and some detents are two positions
//! wide). Channels that need the tuner to move carry a frequency step index.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Channel that selects the HDMI source; every other channel is composite
pub const HDMI_CHANNEL: u32 = 13;

/// One row of the channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Logical channel number (1-based)
    pub channel: u32,
    /// Raw encoder position
    pub position: i32,
    /// Tuner step index, if this channel moves the tuner
    #[serde(default)]
    pub frequency: Option<i32>,
}

impl ChannelEntry {
    /// Create a new entry
    pub const fn new(channel: u32, position: i32, frequency: Option<i32>) -> Self {
        Self {
            channel,
            position,
            frequency,
        }
    }
}

/// Table the dial ships with
const DEFAULT_TABLE: [ChannelEntry; 22] = [
    ChannelEntry::new(1, 39, None),
    ChannelEntry::new(1, 0, None),
    ChannelEntry::new(2, 2, None),
    ChannelEntry::new(2, 3, None),
    ChannelEntry::new(3, 6, None),
    ChannelEntry::new(4, 8, None),
    ChannelEntry::new(4, 9, None),
    ChannelEntry::new(5, 12, None),
    ChannelEntry::new(6, 15, None),
    ChannelEntry::new(6, 16, None),
    ChannelEntry::new(7, 18, Some(16)),
    ChannelEntry::new(8, 21, Some(18)),
    ChannelEntry::new(8, 22, Some(18)),
    ChannelEntry::new(9, 24, None),
    ChannelEntry::new(10, 27, Some(20)),
    ChannelEntry::new(10, 28, Some(20)),
    ChannelEntry::new(11, 30, Some(21)),
    ChannelEntry::new(11, 31, Some(21)),
    ChannelEntry::new(12, 33, Some(21)),
    ChannelEntry::new(12, 34, Some(21)),
    ChannelEntry::new(13, 36, Some(22)),
    ChannelEntry::new(13, 37, Some(22)),
];

/// Result of a successful lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMatch {
    /// Logical channel
    pub channel: u32,
    /// Tuner step index (None = no relay motion for this channel)
    pub frequency: Option<i32>,
}

/// Read-only position lookup table
///
/// Table order is a priority: when two entries share a position the first
/// one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    entries: Vec<ChannelEntry>,
}

impl ChannelMap {
    /// Build a map from an explicit table
    pub fn new(entries: Vec<ChannelEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        if let Some(bad) = entries.iter().find(|e| e.channel == 0) {
            return Err(ConfigError::InvalidChannel {
                channel: bad.channel,
                position: bad.position,
            });
        }
        Ok(Self { entries })
    }

    /// Look up a raw encoder position
    ///
    /// Exact match only. `None` means "ignore this reading".
    pub fn lookup(&self, position: i32) -> Option<ChannelMatch> {
        self.entries
            .iter()
            .find(|e| e.position == position)
            .map(|e| ChannelMatch {
                channel: e.channel,
                frequency: e.frequency,
            })
    }

    /// All table rows in priority order
    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    /// Distinct channel numbers, ascending
    pub fn channels(&self) -> Vec<u32> {
        let mut channels: Vec<u32> = self.entries.iter().map(|e| e.channel).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TABLE.to_vec(),
        }
    }
}
