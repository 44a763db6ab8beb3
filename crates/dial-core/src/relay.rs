//! Relay outputs and the commands that drive them

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ActuatorError;

/// One physical relay output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayOutput {
    /// Tuner step-up relay
    Up,
    /// Tuner step-down relay
    Down,
    /// HDMI / composite source selector
    Source,
}

impl RelayOutput {
    /// All outputs, in initialisation order
    pub const ALL: [RelayOutput; 3] = [RelayOutput::Up, RelayOutput::Down, RelayOutput::Source];

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for RelayOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single relay action executed by the relay worker
///
/// Commands carry the target level so the worker never needs any state of
/// its own to execute them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Drive the step-up relay
    SetUp(bool),
    /// Drive the step-down relay
    SetDown(bool),
    /// Drive the source selector relay
    SetSource(bool),
}

impl RelayCommand {
    /// Output this command writes
    pub fn output(&self) -> RelayOutput {
        match self {
            Self::SetUp(_) => RelayOutput::Up,
            Self::SetDown(_) => RelayOutput::Down,
            Self::SetSource(_) => RelayOutput::Source,
        }
    }

    /// Level this command writes (true = HIGH)
    pub fn level(&self) -> bool {
        match *self {
            Self::SetUp(level) | Self::SetDown(level) | Self::SetSource(level) => level,
        }
    }

    /// Apply this command through an actuator
    pub fn apply(&self, actuator: &dyn RelayActuator) -> Result<(), ActuatorError> {
        actuator.set_output(self.output(), self.level())
    }
}

/// Stepping direction for the tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Command that closes this direction's relay
    pub fn engage(&self) -> RelayCommand {
        match self {
            Self::Up => RelayCommand::SetUp(true),
            Self::Down => RelayCommand::SetDown(true),
        }
    }

    /// Command that opens this direction's relay
    pub fn disengage(&self) -> RelayCommand {
        match self {
            Self::Up => RelayCommand::SetUp(false),
            Self::Down => RelayCommand::SetDown(false),
        }
    }

    /// One full pulse: engage then disengage
    pub fn pulse(&self) -> [RelayCommand; 2] {
        [self.engage(), self.disengage()]
    }
}

/// Something that can set a relay output high or low
///
/// Implementations must be internally synchronised: the relay worker and
/// the switcher's source toggle share one actuator, and two writes to the
/// same output must never interleave.
pub trait RelayActuator: Send + Sync {
    /// Set an output to the given level (true = HIGH)
    fn set_output(&self, output: RelayOutput, level: bool) -> Result<(), ActuatorError>;
}

impl<T: RelayActuator + ?Sized> RelayActuator for Arc<T> {
    fn set_output(&self, output: RelayOutput, level: bool) -> Result<(), ActuatorError> {
        (**self).set_output(output, level)
    }
}
