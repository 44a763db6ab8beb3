//! Dial Tuner Core
//!
//! This crate provides the channel switching logic for a rotary-dial tuner
//! controller: a rotary encoder selects a channel, and a bank of relays
//! pulses a legacy analog tuner up or down to that channel's step index and
//! routes the right video source.
//!
//! # Architecture
//!
//! - [`ChannelMap`] turns raw encoder positions into channels
//! - [`ChannelSwitcher`] decides source and stepping per poll and records state
//! - [`RelayQueue`] plus the relay worker task play stepping pulses out one
//!   at a time with a settle delay between actions
//! - [`StateStore`] keeps the tuner position and source across restarts
//!
//! Hardware is reached only through [`PositionSensor`] and [`RelayActuator`],
//! so everything here runs without a Pi attached.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dial_core::{spawn_relay_worker, ChannelMap, ChannelSwitcher, JsonFileStore, DEFAULT_SETTLE};
//!
//! let relays: Arc<dyn dial_core::RelayActuator> = Arc::new(relay_bank);
//! let (queue, _worker) = spawn_relay_worker(relays.clone(), DEFAULT_SETTLE);
//! let mut switcher = ChannelSwitcher::from_store(
//!     ChannelMap::default(),
//!     relays,
//!     queue,
//!     Box::new(JsonFileStore::new("state.json")),
//! );
//! switcher.initialize();
//!
//! loop {
//!     switcher.poll(&mut sensor)?;
//! }
//! ```

pub mod channel_map;
pub mod error;
pub mod queue;
pub mod relay;
pub mod sensor;
pub mod store;
pub mod switcher;

pub use channel_map::{ChannelEntry, ChannelMap, ChannelMatch, HDMI_CHANNEL};
pub use error::{ActuatorError, ConfigError, SensorError, StoreError, SwitchError};
pub use queue::{run_relay_worker, spawn_relay_worker, RelayQueue, WorkerStats, DEFAULT_SETTLE};
pub use relay::{Direction, RelayActuator, RelayCommand, RelayOutput};
pub use sensor::PositionSensor;
pub use store::{JsonFileStore, PersistedRecord, Source, StateStore};
pub use switcher::{ChannelCallback, ChannelSwitcher, Step, SwitcherState, Transition};
