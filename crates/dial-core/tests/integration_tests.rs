//! Integration tests for the channel switcher
//!
//! These tests verify end-to-end behavior of the switching core including:
//! - Source selection for the HDMI channel and every other channel
//! - Pulse counts and direction for tuner stepping
//! - Debouncing of settled readings and ignoring unmapped positions
//! - Persistence and resume
//! - Ordering and spacing of relay actions played out by the worker

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dial_core::{
    spawn_relay_worker, ChannelMap, ChannelSwitcher, Direction, JsonFileStore, PersistedRecord,
    RelayCommand, RelayOutput, RelayQueue, Source, StateStore, SwitchError, SwitcherState,
};
use dial_sim::{MemoryStore, RecordingRelayBank, ScriptedSensor};
use tokio::sync::mpsc::UnboundedReceiver;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// A switcher wired to simulated hardware, with the queue left undrained
    pub struct Rig {
        pub switcher: ChannelSwitcher,
        pub relays: Arc<RecordingRelayBank>,
        pub store: MemoryStore,
        pub queued: UnboundedReceiver<RelayCommand>,
        pub notified: Arc<Mutex<Vec<u32>>>,
    }

    impl Rig {
        /// Everything queued since the last call
        pub fn drain(&mut self) -> Vec<RelayCommand> {
            let mut out = Vec::new();
            while let Ok(cmd) = self.queued.try_recv() {
                out.push(cmd);
            }
            out
        }

        /// Notifications received so far
        pub fn notified(&self) -> Vec<u32> {
            self.notified.lock().unwrap().clone()
        }
    }

    /// Build a rig starting from an explicit state
    pub fn rig(state: SwitcherState) -> Rig {
        let relays = Arc::new(RecordingRelayBank::new());
        let store = MemoryStore::new();
        let (queue, queued) = RelayQueue::channel();
        let notified = Arc::new(Mutex::new(Vec::new()));

        let mut switcher = ChannelSwitcher::new(
            ChannelMap::default(),
            state,
            relays.clone(),
            queue,
            Box::new(store.clone()),
        );
        let sink = notified.clone();
        switcher.on_channel_changed(move |channel| sink.lock().unwrap().push(channel));

        Rig {
            switcher,
            relays,
            store,
            queued,
            notified,
        }
    }

    /// Expected queue contents for `pulses` pulses in one direction
    pub fn pulses(direction: Direction, pulses: usize) -> Vec<RelayCommand> {
        std::iter::repeat(direction.pulse())
            .take(pulses)
            .flatten()
            .collect()
    }

    /// Source relay writes recorded so far
    pub fn source_writes(relays: &RecordingRelayBank) -> Vec<bool> {
        relays
            .events_for(RelayOutput::Source)
            .iter()
            .map(|e| e.level)
            .collect()
    }
}

// ============================================================================
// Transition Scenarios
// ============================================================================

mod scenario_tests {
    use super::*;

    #[test]
    fn one_step_up_into_channel_seven() {
        let mut rig = helpers::rig(SwitcherState::new(6, 15, Source::Composite));

        let t = rig.switcher.change(18).unwrap();

        assert!(t.source_switch.is_none());
        assert!(helpers::source_writes(&rig.relays).is_empty());
        assert_eq!(rig.drain(), helpers::pulses(Direction::Up, 1));
        assert_eq!(
            rig.switcher.state(),
            &SwitcherState::new(7, 16, Source::Composite)
        );
        assert_eq!(rig.notified(), vec![7]);
    }

    #[test]
    fn hdmi_channel_switches_source_and_steps_up() {
        let mut rig = helpers::rig(SwitcherState::new(1, 0, Source::Composite));

        let t = rig.switcher.change(36).unwrap();

        assert_eq!(t.source_switch, Some(Source::Hdmi));
        assert_eq!(helpers::source_writes(&rig.relays), vec![false]);
        assert_eq!(rig.drain(), helpers::pulses(Direction::Up, 22));
        assert_eq!(
            rig.switcher.state(),
            &SwitcherState::new(13, 22, Source::Hdmi)
        );
        assert_eq!(rig.notified(), vec![13]);
    }

    #[test]
    fn source_toggles_exactly_twice_through_hdmi() {
        let mut rig = helpers::rig(SwitcherState::default());

        rig.switcher.change(12); // channel 5
        rig.switcher.change(36); // channel 13
        rig.switcher.change(12); // channel 5

        assert_eq!(helpers::source_writes(&rig.relays), vec![false, true]);
        assert_eq!(rig.switcher.state().current_source, Source::Composite);
        assert_eq!(rig.notified(), vec![5, 13, 5]);
    }

    #[test]
    fn lower_channel_steps_down() {
        let mut rig = helpers::rig(SwitcherState::new(13, 22, Source::Hdmi));

        let t = rig.switcher.change(27).unwrap(); // channel 10, frequency 20

        assert_eq!(t.source_switch, Some(Source::Composite));
        assert_eq!(rig.drain(), helpers::pulses(Direction::Down, 2));
        assert_eq!(rig.switcher.state().previous_frequency, 20);
    }

    #[test]
    fn same_band_change_queues_nothing() {
        let mut rig = helpers::rig(SwitcherState::new(11, 21, Source::Composite));

        let t = rig.switcher.change(33).unwrap(); // channel 12, also 21

        assert_eq!(t.step.map(|s| s.pulses), Some(0));
        assert!(rig.drain().is_empty());
        assert_eq!(rig.switcher.state().previous_channel, 12);
        assert_eq!(rig.notified(), vec![12]);
    }
}

// ============================================================================
// Debounce and Lookup Tests
// ============================================================================

mod debounce_tests {
    use super::*;

    #[test]
    fn unchanged_position_is_ignored_second_time() {
        let mut rig = helpers::rig(SwitcherState::new(6, 15, Source::Composite));

        assert!(rig.switcher.change(18).is_some());
        rig.drain();

        assert!(rig.switcher.change(18).is_none());
        assert!(rig.drain().is_empty());
        assert_eq!(rig.notified(), vec![7]);
    }

    #[test]
    fn alias_position_of_same_channel_is_ignored() {
        let mut rig = helpers::rig(SwitcherState::new(8, 18, Source::Composite));

        assert!(rig.switcher.change(21).is_none());
        assert!(rig.switcher.change(22).is_none());
        assert!(rig.drain().is_empty());
    }

    #[test]
    fn unmapped_position_is_a_no_op() {
        let start = SwitcherState::new(7, 16, Source::Composite);
        let mut rig = helpers::rig(start);

        assert!(rig.switcher.change(19).is_none());
        assert_eq!(rig.switcher.state(), &start);
        assert!(rig.drain().is_empty());
        assert!(rig.relays.events().is_empty());
        assert_eq!(rig.store.saves(), 0);
    }
}

// ============================================================================
// Persistence Tests
// ============================================================================

mod persistence_tests {
    use super::*;

    #[test]
    fn transition_persists_frequency_and_source() {
        let mut rig = helpers::rig(SwitcherState::new(1, 0, Source::Composite));

        rig.switcher.change(36);

        assert_eq!(
            rig.store.record(),
            Some(PersistedRecord::new(22, Some(Source::Hdmi)))
        );
    }

    #[test]
    fn save_failure_keeps_transition() {
        let mut rig = helpers::rig(SwitcherState::new(6, 15, Source::Composite));
        rig.store.set_failing(true);

        assert!(rig.switcher.change(18).is_some());
        assert_eq!(rig.switcher.state().previous_frequency, 16);
        assert_eq!(rig.notified(), vec![7]);
    }

    #[test]
    fn source_toggle_without_frequency_is_not_saved() {
        let mut rig = helpers::rig(SwitcherState::new(13, 22, Source::Hdmi));

        let t = rig.switcher.change(24).unwrap();

        assert_eq!(t.to_channel, 9);
        assert_eq!(t.source_switch, Some(Source::Composite));
        assert!(t.step.is_none());
        assert_eq!(rig.store.saves(), 0);
        assert_eq!(rig.store.record(), None);
        assert_eq!(rig.notified(), vec![9]);
        assert_eq!(rig.switcher.state().previous_frequency, 22);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        store
            .save(&PersistedRecord::new(18, Some(Source::Composite)))
            .unwrap();

        assert_eq!(
            store.load(),
            PersistedRecord::new(18, Some(Source::Composite))
        );
    }

    #[test]
    fn file_store_missing_or_corrupt_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileStore::new(dir.path().join("missing.json"));
        assert_eq!(missing.load(), PersistedRecord::new(0, None));

        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "{\"frequency\": \"eighteen\"").unwrap();
        assert_eq!(JsonFileStore::new(path).load(), PersistedRecord::new(0, None));
    }

    #[test]
    fn resume_from_store() {
        let store = MemoryStore::with_record(PersistedRecord::new(18, Some(Source::Composite)));
        let (queue, mut queued) = RelayQueue::channel();

        let mut switcher = ChannelSwitcher::from_store(
            ChannelMap::default(),
            Arc::new(RecordingRelayBank::new()),
            queue,
            Box::new(store),
        );
        assert_eq!(
            switcher.state(),
            &SwitcherState::new(0, 18, Source::Composite)
        );

        // Channel 10 sits two steps above the saved position
        switcher.change(28);
        let mut count = 0;
        while queued.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 4);
    }
}

// ============================================================================
// Poll Tests
// ============================================================================

mod poll_tests {
    use super::*;

    #[test]
    fn read_fault_is_surfaced_without_state_change() {
        let start = SwitcherState::new(6, 15, Source::Composite);
        let mut rig = helpers::rig(start);
        let mut sensor = ScriptedSensor::default();
        sensor.push_fault("i2c nack").push(18);

        let err = rig.switcher.poll(&mut sensor).unwrap_err();
        assert!(matches!(err, SwitchError::Read(_)));
        assert_eq!(rig.switcher.state(), &start);
        assert_eq!(sensor.reads(), 1);

        // The next poll is the retry
        let t = rig.switcher.poll(&mut sensor).unwrap();
        assert_eq!(t.map(|t| t.to_channel), Some(7));
    }
}

// ============================================================================
// Relay Worker Tests
// ============================================================================

mod worker_tests {
    use super::*;

    #[tokio::test]
    async fn worker_preserves_order_and_spacing() {
        let relays = Arc::new(RecordingRelayBank::new());
        let settle = Duration::from_millis(5);
        let (queue, worker) = spawn_relay_worker(relays.clone(), settle);

        let sent = [
            RelayCommand::SetUp(true),
            RelayCommand::SetDown(true),
            RelayCommand::SetUp(false),
        ];
        for cmd in sent {
            assert!(queue.push(cmd));
        }
        drop(queue);

        let stats = worker.await.unwrap();
        assert_eq!(stats.executed, 3);
        assert_eq!(relays.commands(), sent.to_vec());

        let events = relays.events();
        for pair in events.windows(2) {
            assert!(pair[1].at.duration_since(pair[0].at) >= settle);
        }
    }

    #[tokio::test]
    async fn worker_continues_past_failed_actions() {
        let relays = Arc::new(RecordingRelayBank::new());
        relays.set_failing(RelayOutput::Down, true);
        let (queue, worker) = spawn_relay_worker(relays.clone(), Duration::from_millis(1));

        queue.push_pulses(Direction::Down, 1);
        queue.push_pulses(Direction::Up, 1);
        drop(queue);

        let stats = worker.await.unwrap();
        assert_eq!(stats.failed, 2);
        assert_eq!(relays.commands(), helpers::pulses(Direction::Up, 1));
    }

    #[tokio::test]
    async fn switcher_and_worker_end_to_end() {
        let relays = Arc::new(RecordingRelayBank::new());
        let (queue, worker) = spawn_relay_worker(relays.clone(), Duration::from_millis(1));
        let mut switcher = ChannelSwitcher::new(
            ChannelMap::default(),
            SwitcherState::new(1, 0, Source::Composite),
            relays.clone(),
            queue,
            Box::new(MemoryStore::new()),
        );

        switcher.change(36);
        drop(switcher);
        worker.await.unwrap();

        let mut expected = vec![RelayCommand::SetSource(false)];
        expected.extend(helpers::pulses(Direction::Up, 22));
        assert_eq!(relays.commands(), expected);
        assert!(!relays.level(RelayOutput::Up));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use dial_core::ChannelEntry;
    use proptest::prelude::*;

    fn table_positions() -> Vec<i32> {
        ChannelMap::default()
            .entries()
            .iter()
            .map(|e| e.position)
            .collect()
    }

    fn unmapped_position() -> impl Strategy<Value = i32> {
        let mapped = table_positions();
        (-100i32..300).prop_filter("position is in the table", move |p| !mapped.contains(p))
    }

    fn stepping_entry() -> impl Strategy<Value = ChannelEntry> {
        let entries: Vec<ChannelEntry> = ChannelMap::default()
            .entries()
            .iter()
            .filter(|e| e.frequency.is_some())
            .copied()
            .collect();
        prop::sample::select(entries)
    }

    fn source() -> impl Strategy<Value = Source> {
        prop_oneof![Just(Source::Hdmi), Just(Source::Composite)]
    }

    proptest! {
        #[test]
        fn unmapped_positions_never_change_anything(
            position in unmapped_position(),
            channel in 0u32..14,
            frequency in 0i32..40,
            src in source(),
        ) {
            let start = SwitcherState::new(channel, frequency, src);
            let mut rig = helpers::rig(start);

            prop_assert!(rig.switcher.change(position).is_none());
            prop_assert_eq!(rig.switcher.state(), &start);
            prop_assert!(rig.drain().is_empty());
            prop_assert!(rig.relays.events().is_empty());
        }

        #[test]
        fn pulse_count_matches_frequency_distance(
            entry in stepping_entry(),
            from_channel in 0u32..14,
            from_frequency in 0i32..40,
        ) {
            prop_assume!(entry.channel != from_channel);
            let target = entry.frequency.unwrap();
            let mut rig = helpers::rig(SwitcherState::new(from_channel, from_frequency, Source::Composite));

            rig.switcher.change(entry.position);
            let queued = rig.drain();

            prop_assert_eq!(queued.len() as u32, 2 * target.abs_diff(from_frequency));

            let outputs: Vec<RelayOutput> = queued.iter().map(|c| c.output()).collect();
            prop_assert!(outputs.windows(2).all(|w| w[0] == w[1]));
            if let Some(first) = queued.first() {
                let expected = if target > from_frequency { RelayOutput::Up } else { RelayOutput::Down };
                prop_assert_eq!(first.output(), expected);
            }
            prop_assert_eq!(rig.switcher.state().previous_frequency, target);
        }

        #[test]
        fn hdmi_only_on_channel_thirteen(position in prop::sample::select(table_positions())) {
            let mut rig = helpers::rig(SwitcherState::default());

            if let Some(t) = rig.switcher.change(position) {
                let expected = if t.to_channel == 13 { Source::Hdmi } else { Source::Composite };
                prop_assert_eq!(rig.switcher.state().current_source, expected);
            }
        }
    }
}
