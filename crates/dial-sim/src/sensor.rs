//! Simulated rotary position sensors

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use dial_core::{PositionSensor, SensorError};

/// Scripted reading: a position or a read fault
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reading {
    Position(i32),
    Fault(String),
}

/// Sensor that replays a fixed script of readings
///
/// Once the script is exhausted every read reports the sensor as
/// unavailable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    script: VecDeque<Reading>,
    reads: usize,
}

impl ScriptedSensor {
    /// Create a sensor replaying the given positions
    pub fn new(positions: impl IntoIterator<Item = i32>) -> Self {
        Self {
            script: positions.into_iter().map(Reading::Position).collect(),
            reads: 0,
        }
    }

    /// Append a position to the script
    pub fn push(&mut self, position: i32) -> &mut Self {
        self.script.push_back(Reading::Position(position));
        self
    }

    /// Append a read fault to the script
    pub fn push_fault(&mut self, message: impl Into<String>) -> &mut Self {
        self.script.push_back(Reading::Fault(message.into()));
        self
    }

    /// Readings left in the script
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Number of reads attempted
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl PositionSensor for ScriptedSensor {
    fn read_position(&mut self) -> Result<i32, SensorError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(Reading::Position(p)) => Ok(p),
            Some(Reading::Fault(message)) => Err(SensorError::Io(std::io::Error::other(message))),
            None => Err(SensorError::Unavailable("script exhausted".into())),
        }
    }
}

/// Dial whose position is turned from elsewhere
///
/// Clones share the same position, so one clone can be handed to the poll
/// loop while another is turned by a test or a console reader.
#[derive(Debug, Clone, Default)]
pub struct VirtualDial {
    position: Arc<AtomicI32>,
}

impl VirtualDial {
    /// Create a dial resting at a position
    pub fn new(position: i32) -> Self {
        Self {
            position: Arc::new(AtomicI32::new(position)),
        }
    }

    /// Turn the dial to a position
    pub fn turn_to(&self, position: i32) {
        self.position.store(position, Ordering::Relaxed);
    }

    /// Current position
    pub fn position(&self) -> i32 {
        self.position.load(Ordering::Relaxed)
    }
}

impl PositionSensor for VirtualDial {
    fn read_position(&mut self) -> Result<i32, SensorError> {
        Ok(self.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_replays_then_runs_out() {
        let mut sensor = ScriptedSensor::new([18, 21]);
        sensor.push_fault("bus error");

        assert_eq!(sensor.read_position().unwrap(), 18);
        assert_eq!(sensor.read_position().unwrap(), 21);
        assert!(matches!(sensor.read_position(), Err(SensorError::Io(_))));
        assert!(matches!(
            sensor.read_position(),
            Err(SensorError::Unavailable(_))
        ));
        assert_eq!(sensor.reads(), 4);
        assert_eq!(sensor.remaining(), 0);
    }

    #[test]
    fn test_virtual_dial_clones_share_position() {
        let dial = VirtualDial::new(0);
        let mut reader = dial.clone();

        dial.turn_to(36);
        assert_eq!(reader.read_position().unwrap(), 36);
    }
}
