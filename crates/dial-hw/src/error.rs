//! Error types for hardware backends

use std::io;
use std::path::PathBuf;

use dial_core::RelayOutput;
use thiserror::Error;

/// Errors opening or configuring hardware
#[derive(Debug, Error)]
pub enum HwError {
    /// Device node could not be opened
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I2C slave address could not be selected
    #[error("failed to select I2C address 0x{address:02X}: {source}")]
    Address {
        address: u16,
        #[source]
        source: nix::Error,
    },

    /// GPIO line could not be exported or configured
    #[error("GPIO {pin} ({output}): {source}")]
    Gpio {
        pin: u32,
        output: RelayOutput,
        #[source]
        source: io::Error,
    },
}
