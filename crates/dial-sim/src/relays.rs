//! Recording relay bank for testing
//!
//! Tracks the level of every output and keeps a timestamped log of each
//! write, so tests can check ordering and the spacing between actions.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use dial_core::{ActuatorError, RelayActuator, RelayCommand, RelayOutput};
use tracing::debug;

/// One recorded relay write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEvent {
    /// Output written
    pub output: RelayOutput,
    /// Level written
    pub level: bool,
    /// When the write happened
    pub at: Instant,
}

impl RelayEvent {
    /// The write as a relay command
    pub fn command(&self) -> RelayCommand {
        match self.output {
            RelayOutput::Up => RelayCommand::SetUp(self.level),
            RelayOutput::Down => RelayCommand::SetDown(self.level),
            RelayOutput::Source => RelayCommand::SetSource(self.level),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    levels: [bool; 3],
    events: Vec<RelayEvent>,
    failing: HashSet<RelayOutput>,
}

/// Virtual relay bank
///
/// All writes go through one mutex, so concurrent writers are serialised
/// just as they would be on the real GPIO lines.
#[derive(Debug, Default)]
pub struct RecordingRelayBank {
    inner: Mutex<Inner>,
}

fn slot(output: RelayOutput) -> usize {
    match output {
        RelayOutput::Up => 0,
        RelayOutput::Down => 1,
        RelayOutput::Source => 2,
    }
}

impl RecordingRelayBank {
    /// Create a bank with every output LOW
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes to an output fail (or succeed again)
    pub fn set_failing(&self, output: RelayOutput, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing.insert(output);
        } else {
            inner.failing.remove(&output);
        }
    }

    /// Current level of an output
    pub fn level(&self, output: RelayOutput) -> bool {
        self.lock().levels[slot(output)]
    }

    /// Every successful write so far
    pub fn events(&self) -> Vec<RelayEvent> {
        self.lock().events.clone()
    }

    /// Every successful write so far, as commands
    pub fn commands(&self) -> Vec<RelayCommand> {
        self.lock().events.iter().map(RelayEvent::command).collect()
    }

    /// Successful writes to one output
    pub fn events_for(&self, output: RelayOutput) -> Vec<RelayEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.output == output)
            .copied()
            .collect()
    }

    /// Forget recorded writes (levels are kept)
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoned by a panicking test thread; the log is still valid
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RelayActuator for RecordingRelayBank {
    fn set_output(&self, output: RelayOutput, level: bool) -> Result<(), ActuatorError> {
        let mut inner = self.lock();

        if inner.failing.contains(&output) {
            return Err(ActuatorError::Io {
                output,
                source: std::io::Error::other("simulated relay fault"),
            });
        }

        debug!("Virtual relay {} -> {}", output, level);
        inner.levels[slot(output)] = level;
        inner.events.push(RelayEvent {
            output,
            level,
            at: Instant::now(),
        });
        Ok(())
    }
}
