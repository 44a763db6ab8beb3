//! Relay bank on sysfs GPIO lines
//!
//! Each relay output is one GPIO line exported through `/sys/class/gpio`.
//! Lines are configured as outputs starting LOW (relay open). Every line has
//! its own lock, so the relay worker and the source toggle can never
//! interleave writes to the same output.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use dial_core::{ActuatorError, RelayActuator, RelayOutput};
use tracing::{debug, info, warn};

use crate::error::HwError;

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev may still be fixing permissions right after export
const EXPORT_RETRIES: u32 = 10;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// BCM pin numbers for the three relays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPins {
    /// Step-up relay
    pub up: u32,
    /// Step-down relay
    pub down: u32,
    /// Source selector relay
    pub source: u32,
}

impl RelayPins {
    /// Pin wired to an output
    pub fn pin(&self, output: RelayOutput) -> u32 {
        match output {
            RelayOutput::Up => self.up,
            RelayOutput::Down => self.down,
            RelayOutput::Source => self.source,
        }
    }
}

impl Default for RelayPins {
    fn default() -> Self {
        Self {
            up: 17,
            down: 27,
            source: 22,
        }
    }
}

#[derive(Debug)]
struct GpioLine {
    pin: u32,
    value: Mutex<File>,
}

impl GpioLine {
    fn write(&self, level: bool) -> io::Result<()> {
        let mut file = self.value.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(if level { b"1" } else { b"0" })
    }
}

/// Three relays driven through sysfs GPIO
#[derive(Debug)]
pub struct SysfsRelayBank {
    root: PathBuf,
    up: GpioLine,
    down: GpioLine,
    source: GpioLine,
}

impl SysfsRelayBank {
    /// Export and configure the relay pins under `/sys/class/gpio`
    pub fn open(pins: RelayPins) -> Result<Self, HwError> {
        Self::open_at(SYSFS_GPIO_ROOT, pins)
    }

    /// Export and configure the relay pins under an explicit sysfs root
    pub fn open_at(root: impl AsRef<Path>, pins: RelayPins) -> Result<Self, HwError> {
        let root = root.as_ref().to_path_buf();
        let bank = Self {
            up: open_line(&root, pins.up, RelayOutput::Up)?,
            down: open_line(&root, pins.down, RelayOutput::Down)?,
            source: open_line(&root, pins.source, RelayOutput::Source)?,
            root,
        };
        info!(
            "Relay bank ready (up GPIO{}, down GPIO{}, source GPIO{})",
            pins.up, pins.down, pins.source
        );
        Ok(bank)
    }

    fn line(&self, output: RelayOutput) -> &GpioLine {
        match output {
            RelayOutput::Up => &self.up,
            RelayOutput::Down => &self.down,
            RelayOutput::Source => &self.source,
        }
    }

    /// Drive every relay LOW and unexport the pins
    pub fn release(&self) {
        for output in RelayOutput::ALL {
            let line = self.line(output);
            if let Err(e) = line.write(false) {
                warn!("Failed to reset GPIO{} ({}): {}", line.pin, output, e);
            }
            if let Err(e) = fs::write(self.root.join("unexport"), line.pin.to_string()) {
                debug!("Failed to unexport GPIO{}: {}", line.pin, e);
            }
        }
        info!("Relay bank released");
    }
}

impl RelayActuator for SysfsRelayBank {
    fn set_output(&self, output: RelayOutput, level: bool) -> Result<(), ActuatorError> {
        self.line(output)
            .write(level)
            .map_err(|source| ActuatorError::Io { output, source })
    }
}

fn open_line(root: &Path, pin: u32, output: RelayOutput) -> Result<GpioLine, HwError> {
    let gpio_err = |source: io::Error| HwError::Gpio {
        pin,
        output,
        source,
    };
    let dir = root.join(format!("gpio{}", pin));

    if !dir.exists() {
        fs::write(root.join("export"), pin.to_string()).map_err(gpio_err)?;
        debug!("Exported GPIO{}", pin);
    }

    // "low" configures the line as an output already driven LOW
    retry_permission(|| fs::write(dir.join("direction"), "low")).map_err(gpio_err)?;

    let value = retry_permission(|| OpenOptions::new().write(true).open(dir.join("value")))
        .map_err(gpio_err)?;

    Ok(GpioLine {
        pin,
        value: Mutex::new(value),
    })
}

fn retry_permission<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && attempt < EXPORT_RETRIES => {
                attempt += 1;
                thread::sleep(EXPORT_RETRY_DELAY);
            }
            other => return other,
        }
    }
}
