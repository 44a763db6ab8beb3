//! Dial Tuner Hardware Backends
//!
//! Linux implementations of the switching core's hardware capabilities:
//!
//! - **I2cRotaryEncoder**: reads the dial position as one byte from an I2C
//!   slave (`/dev/i2c-N`)
//! - **SysfsRelayBank**: drives the up, down and source relays through
//!   sysfs GPIO lines
//!
//! # Example
//!
//! ```rust,no_run
//! use dial_core::{PositionSensor, RelayActuator, RelayOutput};
//! use dial_hw::{I2cRotaryEncoder, RelayPins, SysfsRelayBank};
//!
//! let mut encoder = I2cRotaryEncoder::open(1, 0x08)?;
//! let relays = SysfsRelayBank::open(RelayPins::default())?;
//!
//! let position = encoder.read_position()?;
//! relays.set_output(RelayOutput::Source, true)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod gpio;
pub mod i2c;

pub use error::HwError;
pub use gpio::{RelayPins, SysfsRelayBank, SYSFS_GPIO_ROOT};
pub use i2c::{I2cRotaryEncoder, DEFAULT_ADDRESS, DEFAULT_BUS};
