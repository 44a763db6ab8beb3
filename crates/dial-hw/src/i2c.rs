//! Rotary encoder read over Linux I2C
//!
//! The encoder sits behind a small microcontroller that answers a one-byte
//! read with the current dial position.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use dial_core::{PositionSensor, SensorError};
use tracing::{debug, info};

use crate::error::HwError;

/// Default I2C bus on a Pi (pins 3/5)
pub const DEFAULT_BUS: u8 = 1;

/// Default encoder slave address
pub const DEFAULT_ADDRESS: u16 = 0x08;

// I2C_SLAVE from linux/i2c-dev.h
nix::ioctl_write_int_bad!(i2c_set_slave, 0x0703);

/// Rotary encoder on an I2C bus
#[derive(Debug)]
pub struct I2cRotaryEncoder {
    file: File,
    path: PathBuf,
    address: u16,
}

impl I2cRotaryEncoder {
    /// Open `/dev/i2c-<bus>` and select the encoder's address
    pub fn open(bus: u8, address: u16) -> Result<Self, HwError> {
        Self::open_path(format!("/dev/i2c-{}", bus), address)
    }

    /// Open an explicit I2C device node
    pub fn open_path(path: impl AsRef<Path>, address: u16) -> Result<Self, HwError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| HwError::Open {
                path: path.clone(),
                source,
            })?;

        // SAFETY: the fd is owned by `file` and stays open for the call;
        // I2C_SLAVE takes the address by value.
        unsafe { i2c_set_slave(file.as_raw_fd(), i32::from(address)) }
            .map_err(|source| HwError::Address { address, source })?;

        info!(
            "Rotary encoder on {} at 0x{:02X}",
            path.display(),
            address
        );
        Ok(Self {
            file,
            path,
            address,
        })
    }

    /// Device node in use
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Slave address in use
    pub fn address(&self) -> u16 {
        self.address
    }
}

impl PositionSensor for I2cRotaryEncoder {
    fn read_position(&mut self) -> Result<i32, SensorError> {
        let mut buf = [0u8; 1];
        self.file.read_exact(&mut buf)?;
        debug!("Encoder position {}", buf[0]);
        Ok(i32::from(buf[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bus_reports_path() {
        let err = I2cRotaryEncoder::open_path("/nonexistent/i2c-9", DEFAULT_ADDRESS).unwrap_err();
        assert!(matches!(err, HwError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/i2c-9"));
    }

    #[test]
    fn test_regular_file_rejects_slave_ioctl() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = I2cRotaryEncoder::open_path(file.path(), DEFAULT_ADDRESS).unwrap_err();
        assert!(matches!(err, HwError::Address { address: 0x08, .. }));
    }
}
