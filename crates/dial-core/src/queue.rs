//! Relay command queue and worker
//!
//! Stepping the tuner means pulsing a relay once per frequency step. Pulses
//! are pushed onto an unbounded FIFO and drained by a single worker task,
//! which is the only writer of the stepping outputs. The worker runs one
//! action at a time and waits a fixed settle delay after each one, so the
//! relays never chatter and no two actions ever overlap.
//!
//! Producers never wait for the worker. Polling latency is therefore
//! independent of how long a long run of pulses takes to play out.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dial_core::queue::{spawn_relay_worker, DEFAULT_SETTLE};
//! use dial_core::Direction;
//!
//! let (queue, worker) = spawn_relay_worker(Arc::new(relays), DEFAULT_SETTLE);
//! queue.push_pulses(Direction::Up, 3);
//!
//! // Dropping the queue lets the worker finish what is queued and exit
//! drop(queue);
//! let stats = worker.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::relay::{Direction, RelayActuator, RelayCommand};

/// Delay after every relay action
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(20);

/// Producer side of the relay queue
#[derive(Debug)]
pub struct RelayQueue {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayQueue {
    /// Create a queue and the receiver a worker will drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RelayCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue one action
    ///
    /// Returns false if the worker is gone and the action was dropped.
    pub fn push(&self, cmd: RelayCommand) -> bool {
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("Relay worker not running, dropped {:?}", e.0);
                false
            }
        }
    }

    /// Enqueue `count` engage/disengage pairs in one direction
    ///
    /// Returns the number of actions accepted.
    pub fn push_pulses(&self, direction: Direction, count: u32) -> usize {
        let mut accepted = 0;
        for _ in 0..count {
            for cmd in direction.pulse() {
                if !self.push(cmd) {
                    return accepted;
                }
                accepted += 1;
            }
        }
        accepted
    }

    /// Whether the worker has stopped receiving
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Counters reported when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Actions that reached the relay
    pub executed: u64,
    /// Actions whose write failed
    pub failed: u64,
}

/// Drain relay commands until every producer is dropped
///
/// A failed write is logged and skipped; the worker keeps going so that a
/// single bad write cannot stall every later channel change.
pub async fn run_relay_worker(
    mut rx: mpsc::UnboundedReceiver<RelayCommand>,
    actuator: Arc<dyn RelayActuator>,
    settle: Duration,
) -> WorkerStats {
    info!("Relay worker starting (settle {}ms)", settle.as_millis());

    let mut stats = WorkerStats::default();

    while let Some(cmd) = rx.recv().await {
        debug!("Relay {} -> {}", cmd.output(), if cmd.level() { "HIGH" } else { "LOW" });

        match cmd.apply(actuator.as_ref()) {
            Ok(()) => stats.executed += 1,
            Err(e) => {
                stats.failed += 1;
                warn!("Relay action {:?} failed: {}", cmd, e);
            }
        }

        tokio::time::sleep(settle).await;
    }

    info!(
        "Relay worker stopped ({} executed, {} failed)",
        stats.executed, stats.failed
    );
    stats
}

/// Spawn the relay worker on the current tokio runtime
///
/// Must be called from within a runtime.
pub fn spawn_relay_worker(
    actuator: Arc<dyn RelayActuator>,
    settle: Duration,
) -> (RelayQueue, JoinHandle<WorkerStats>) {
    let (queue, rx) = RelayQueue::channel();
    let handle = tokio::spawn(run_relay_worker(rx, actuator, settle));
    (queue, handle)
}
