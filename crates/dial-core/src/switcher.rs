//! Channel switching state machine
//!
//! Run once per poll. A settled dial reading resolves to a channel; when
//! the channel differs from the last one, the switcher selects the source
//! for it, queues the relay pulses that walk the tuner to the channel's
//! step index, and records the new state.
//!
//! The switcher never waits for the relays. Source changes are written
//! directly (they do not need to be ordered against stepping), while
//! stepping pulses go through the relay queue.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel_map::{ChannelMap, HDMI_CHANNEL};
use crate::error::SwitchError;
use crate::queue::RelayQueue;
use crate::relay::{Direction, RelayActuator, RelayOutput};
use crate::sensor::PositionSensor;
use crate::store::{PersistedRecord, Source, StateStore};

/// Callback fired after a committed channel change
pub type ChannelCallback = Box<dyn FnMut(u32) + Send>;

/// Mutable state carried between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitcherState {
    /// Last resolved channel (0 before the first reading)
    pub previous_channel: u32,
    /// Tuner step index the relays were last sent to
    pub previous_frequency: i32,
    /// Source currently selected on the source relay
    pub current_source: Source,
}

impl SwitcherState {
    /// Create a state
    pub fn new(previous_channel: u32, previous_frequency: i32, current_source: Source) -> Self {
        Self {
            previous_channel,
            previous_frequency,
            current_source,
        }
    }

    /// Boot state from a persisted record
    ///
    /// An unset source resolves to composite, which is what relay
    /// initialisation selects when no HDMI source was recorded.
    pub fn resume(record: &PersistedRecord) -> Self {
        Self {
            previous_channel: 0,
            previous_frequency: record.frequency,
            current_source: record.source.unwrap_or(Source::Composite),
        }
    }

    /// Resumable subset of this state
    pub fn record(&self) -> PersistedRecord {
        PersistedRecord::new(self.previous_frequency, Some(self.current_source))
    }
}

impl Default for SwitcherState {
    fn default() -> Self {
        Self::resume(&PersistedRecord::default())
    }
}

/// Tuner motion queued by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Direction of every pulse
    pub direction: Direction,
    /// Number of engage/disengage pairs
    pub pulses: u32,
    /// Step index before the move
    pub from_frequency: i32,
    /// Step index after the move
    pub to_frequency: i32,
}

impl Step {
    /// Plan the tuner move for a channel change
    ///
    /// The direction follows the direction the dial was turned in: going
    /// to a higher channel steps down only when the target is lower, going
    /// to a lower channel steps up only when the target is higher.
    pub fn plan(from_channel: u32, to_channel: u32, from_frequency: i32, to_frequency: i32) -> Self {
        let direction = if to_channel > from_channel {
            if to_frequency < from_frequency {
                Direction::Down
            } else {
                Direction::Up
            }
        } else if to_frequency > from_frequency {
            Direction::Up
        } else {
            Direction::Down
        };

        Self {
            direction,
            pulses: to_frequency.abs_diff(from_frequency),
            from_frequency,
            to_frequency,
        }
    }
}

/// A committed channel change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Channel before the change
    pub from_channel: u32,
    /// Channel after the change
    pub to_channel: u32,
    /// New source, if the source relay was toggled
    pub source_switch: Option<Source>,
    /// Tuner motion, if the channel has a step index
    pub step: Option<Step>,
}

impl Transition {
    /// Number of relay actions queued by this transition
    pub fn queued_actions(&self) -> usize {
        self.step.map_or(0, |s| s.pulses as usize * 2)
    }
}

/// The channel switching state machine
pub struct ChannelSwitcher {
    map: ChannelMap,
    state: SwitcherState,
    actuator: Arc<dyn RelayActuator>,
    queue: RelayQueue,
    store: Box<dyn StateStore>,
    on_changed: Option<ChannelCallback>,
}

impl ChannelSwitcher {
    /// Create a switcher with an explicit starting state
    pub fn new(
        map: ChannelMap,
        state: SwitcherState,
        actuator: Arc<dyn RelayActuator>,
        queue: RelayQueue,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            map,
            state,
            actuator,
            queue,
            store,
            on_changed: None,
        }
    }

    /// Create a switcher resuming from the store's last record
    pub fn from_store(
        map: ChannelMap,
        actuator: Arc<dyn RelayActuator>,
        queue: RelayQueue,
        store: Box<dyn StateStore>,
    ) -> Self {
        let record = store.load();
        info!(
            "Resuming at step {} ({})",
            record.frequency,
            record.source.map_or("source unset", |s| s.name())
        );
        Self::new(map, SwitcherState::resume(&record), actuator, queue, store)
    }

    /// Register the channel change notification
    pub fn on_channel_changed(&mut self, callback: impl FnMut(u32) + Send + 'static) {
        self.on_changed = Some(Box::new(callback));
    }

    /// Current state
    pub fn state(&self) -> &SwitcherState {
        &self.state
    }

    /// Channel table in use
    pub fn map(&self) -> &ChannelMap {
        &self.map
    }

    /// Drive every relay to its resting level for the current state
    ///
    /// Stepping relays go LOW; the source relay is set to the current source.
    pub fn initialize(&self) {
        for output in [RelayOutput::Up, RelayOutput::Down] {
            self.write_direct(output, false);
        }
        self.write_direct(RelayOutput::Source, self.state.current_source.relay_level());
        info!(
            "Relays initialised (source {})",
            self.state.current_source.name()
        );
    }

    /// Read one position and act on it
    ///
    /// Read faults are returned to the caller; there is no internal retry.
    pub fn poll(
        &mut self,
        sensor: &mut dyn PositionSensor,
    ) -> Result<Option<Transition>, SwitchError> {
        let position = sensor.read_position()?;
        Ok(self.change(position))
    }

    /// Act on a dial position
    ///
    /// Returns the committed transition, or `None` when the position is not
    /// in the table or still resolves to the current channel.
    pub fn change(&mut self, position: i32) -> Option<Transition> {
        let found = self.map.lookup(position)?;
        let channel = found.channel;
        let from_channel = self.state.previous_channel;

        if channel == from_channel {
            return None;
        }

        if channel > from_channel {
            info!("Channel UP: {} -> {}", from_channel, channel);
        } else {
            info!("Channel DOWN: {} -> {}", from_channel, channel);
        }

        let desired = if channel == HDMI_CHANNEL {
            Source::Hdmi
        } else {
            Source::Composite
        };
        let source_switch = if desired != self.state.current_source {
            self.switch_source(desired);
            Some(desired)
        } else {
            None
        };

        let step = found.frequency.map(|frequency| {
            let step = Step::plan(
                from_channel,
                channel,
                self.state.previous_frequency,
                frequency,
            );
            info!(
                "Switching to frequency {} ({} x {:?})",
                frequency, step.pulses, step.direction
            );
            self.queue.push_pulses(step.direction, step.pulses);
            self.state.previous_frequency = frequency;
            step
        });

        // Only a tuner step is persisted; the source follows the first reading after boot
        if step.is_some() {
            self.persist();
        }

        if let Some(callback) = self.on_changed.as_mut() {
            callback(channel);
        }

        self.state.previous_channel = channel;

        Some(Transition {
            from_channel,
            to_channel: channel,
            source_switch,
            step,
        })
    }

    fn switch_source(&mut self, source: Source) {
        info!("Switching to {}", source.name());
        self.write_direct(RelayOutput::Source, source.relay_level());
        self.state.current_source = source;
    }

    fn write_direct(&self, output: RelayOutput, level: bool) {
        if let Err(e) = self.actuator.set_output(output, level) {
            warn!("Failed to set {} relay: {}", output, e);
        }
    }

    fn persist(&self) {
        let record = self.state.record();
        match self.store.save(&record) {
            Ok(()) => debug!("Persisted {:?}", record),
            Err(e) => warn!("Failed to persist switcher state: {}", e),
        }
    }
}

impl fmt::Debug for ChannelSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSwitcher")
            .field("state", &self.state)
            .field("entries", &self.map.entries().len())
            .field("on_changed", &self.on_changed.is_some())
            .finish()
    }
}
