//! Dial Tuner Simulation Library
//!
//! This crate provides stand-ins for the tuner controller's hardware so the
//! switching core can be exercised without a Pi, relays or an encoder:
//!
//! - **ScriptedSensor**: replays a fixed list of positions (and read faults)
//! - **VirtualDial**: a dial whose position is set from another thread
//! - **RecordingRelayBank**: records every relay write with a timestamp
//! - **MemoryStore**: keeps the persisted record in memory
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dial_core::{ChannelMap, ChannelSwitcher, RelayQueue, SwitcherState};
//! use dial_sim::{MemoryStore, RecordingRelayBank};
//!
//! let relays = Arc::new(RecordingRelayBank::new());
//! let (queue, _rx) = RelayQueue::channel();
//! let mut switcher = ChannelSwitcher::new(
//!     ChannelMap::default(),
//!     SwitcherState::default(),
//!     relays.clone(),
//!     queue,
//!     Box::new(MemoryStore::new()),
//! );
//!
//! // Turning to position 36 selects channel 13, which routes HDMI
//! switcher.change(36);
//! assert_eq!(relays.events().len(), 1);
//! ```

pub mod relays;
pub mod sensor;
pub mod store;

pub use relays::{RecordingRelayBank, RelayEvent};
pub use sensor::{ScriptedSensor, VirtualDial};
pub use store::MemoryStore;
