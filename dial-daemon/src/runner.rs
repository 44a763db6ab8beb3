//! Poll loop
//!
//! Wires the switching core to either the real encoder and relays or the
//! simulated ones, polls the dial until Ctrl-C, then lets the relay worker
//! finish any queued pulses before the relays are released. SIGUSR1 pauses
//! or resumes the HDMI channel video.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dial_core::{
    spawn_relay_worker, ChannelSwitcher, JsonFileStore, PositionSensor, RelayActuator,
    SwitchError, WorkerStats, HDMI_CHANNEL,
};
use dial_hw::{I2cRotaryEncoder, SysfsRelayBank};
use dial_sim::{RecordingRelayBank, VirtualDial};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn, Level};

use crate::player::{MediaPlayer, OmxPlayer, PlayerSettings};
use crate::settings::Settings;

/// Position of the simulated dial before anything is typed (not in any table)
const IDLE_POSITION: i32 = -1;

/// How long shutdown waits for the player to exit
const PLAYER_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Run against the real encoder and relay bank
pub async fn run_hardware(settings: Settings) -> anyhow::Result<()> {
    let relays = Arc::new(
        SysfsRelayBank::open(settings.relay_pins.into()).context("failed to set up relays")?,
    );
    let encoder = I2cRotaryEncoder::open(settings.i2c_bus, settings.i2c_address)
        .context("failed to open rotary encoder")?;

    let result = poll_loop(encoder, relays.clone(), &settings, ctrl_c()).await;
    relays.release();
    result.map(|_| ())
}

/// Run against a virtual dial turned from stdin and a recording relay bank
pub async fn run_simulated(settings: Settings) -> anyhow::Result<()> {
    let relays = Arc::new(RecordingRelayBank::new());
    let dial = VirtualDial::new(IDLE_POSITION);

    info!("Simulation: type a dial position and press enter");
    tokio::spawn(read_console(dial.clone()));

    poll_loop(dial, relays.clone(), &settings, ctrl_c()).await?;
    info!("Simulated relay bank saw {} writes", relays.events().len());
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn read_console(dial: VirtualDial) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim().parse::<i32>() {
                Ok(position) => {
                    debug!("Dial turned to {}", position);
                    dial.turn_to(position);
                }
                Err(_) => warn!("Not a dial position: {:?}", line.trim()),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        }
    }
}

/// Messages to the player task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerCommand {
    Channel(u32),
    TogglePause,
}

/// Dial read health; only the first fault of a run is logged loudly
#[derive(Debug, Default)]
struct FaultLatch {
    faulted: bool,
}

impl FaultLatch {
    /// Log a poll result, returning the level it was logged at
    fn observe<T>(&mut self, result: &Result<T, SwitchError>) -> Option<Level> {
        match result {
            Ok(_) if self.faulted => {
                info!("Dial readable again");
                self.faulted = false;
                Some(Level::INFO)
            }
            Ok(_) => None,
            // Retried by the next tick
            Err(e) if !self.faulted => {
                warn!("{}", e);
                self.faulted = true;
                Some(Level::WARN)
            }
            Err(e) => {
                debug!("{}", e);
                Some(Level::DEBUG)
            }
        }
    }
}

async fn poll_loop<S: PositionSensor>(
    mut sensor: S,
    relays: Arc<dyn RelayActuator>,
    settings: &Settings,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<WorkerStats> {
    let map = settings.channel_map()?;
    let store = JsonFileStore::new(settings.state_path());
    info!(
        "Channel table: {} positions, channels {:?}",
        map.entries().len(),
        map.channels()
    );
    info!("State file: {}", store.path().display());

    let (queue, worker) = spawn_relay_worker(relays.clone(), settings.settle());
    let mut switcher = ChannelSwitcher::from_store(map, relays, queue, Box::new(store));
    switcher.initialize();

    let player = match &settings.player {
        Some(player_settings) => Some(spawn_player(player_settings)?),
        None => None,
    };
    if let Some((tx, _)) = &player {
        let tx = tx.clone();
        switcher.on_channel_changed(move |channel| {
            let _ = tx.send(PlayerCommand::Channel(channel));
        });
    }
    let mut pause_signal =
        signal(SignalKind::user_defined1()).context("failed to listen for SIGUSR1")?;

    let mut ticker = interval(settings.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    let mut faults = FaultLatch::default();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }

            Some(()) = pause_signal.recv() => {
                match &player {
                    Some((tx, _)) => {
                        let _ = tx.send(PlayerCommand::TogglePause);
                    }
                    None => debug!("No player configured, ignoring pause"),
                }
            }

            _ = ticker.tick() => {
                let result = switcher.poll(&mut sensor);
                faults.observe(&result);
                if let Ok(Some(t)) = result {
                    debug!("Committed {:?}", t);
                }
            }
        }
    }

    // Dropping the switcher closes the queue; the worker plays out what is left
    drop(switcher);
    let stats = worker.await.context("relay worker panicked")?;

    if let Some((tx, handle)) = player {
        drop(tx);
        if let Err(e) = handle.await {
            error!("Player task failed: {}", e);
        }
    }

    Ok(stats)
}

/// Start the player task; it loops the configured media while the dial is
/// on the HDMI channel
fn spawn_player(
    settings: &PlayerSettings,
) -> anyhow::Result<(mpsc::UnboundedSender<PlayerCommand>, JoinHandle<()>)> {
    let mut player = OmxPlayer::new(settings).context("invalid player settings")?;
    let media = settings.media.clone();
    let volume = settings.volume;

    let extension = media
        .path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !player.supported_extensions().contains(&extension) {
        warn!(
            "{} does not have a supported extension",
            media.path.display()
        );
    }

    let (tx, mut rx) = mpsc::unbounded_channel();

    // Starting and stopping the player blocks; keep it off the poll loop
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(command) = rx.blocking_recv() {
            match command {
                PlayerCommand::Channel(HDMI_CHANNEL) => {
                    if !player.is_playing() {
                        if let Err(e) = player.play(&media, None, volume) {
                            error!("Failed to start player: {}", e);
                        }
                    }
                }
                PlayerCommand::Channel(_) => {
                    if player.is_playing() {
                        player.stop(PLAYER_STOP_TIMEOUT);
                    }
                }
                PlayerCommand::TogglePause => {
                    if let Err(e) = player.pause() {
                        warn!("Failed to pause player: {}", e);
                    }
                }
            }
        }
        player.stop(PLAYER_STOP_TIMEOUT);
    });

    Ok((tx, handle))
}
