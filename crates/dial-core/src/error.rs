//! Error types for the switching core

use thiserror::Error;

/// Failure reading the rotary position sensor
#[derive(Debug, Error)]
pub enum SensorError {
    /// Bus-level I/O failure
    #[error("sensor I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sensor is not available (not opened, unplugged, script exhausted)
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Failure driving a relay output
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// Output write failed
    #[error("relay I/O error on {output}: {source}")]
    Io {
        /// Output that failed
        output: crate::relay::RelayOutput,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Output is not configured on this relay bank
    #[error("relay output not configured: {0}")]
    NotConfigured(crate::relay::RelayOutput),
}

/// Failure persisting switcher state
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("state store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Invalid static configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Channel numbers start at 1
    #[error("invalid channel number {channel} at position {position}")]
    InvalidChannel { channel: u32, position: i32 },

    /// Table has no entries
    #[error("channel table is empty")]
    EmptyTable,
}

/// Errors surfaced from a poll cycle
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Position read failed; the next poll is the retry
    #[error("position read failed: {0}")]
    Read(#[from] SensorError),
}
