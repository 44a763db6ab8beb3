//! Dial Tuner Daemon
//!
//! Polls the rotary dial and drives the tuner relays so that an analog tuner
//! follows the channel the dial points at.
//!
//! With a player configured, `kill -USR1 <pid>` pauses or resumes the video
//! shown on the HDMI channel.

mod player;
mod runner;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dialtuner - rotary dial channel switcher for a relay-driven tuner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (default: $XDG_CONFIG_HOME/dialtuner/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file holding the tuner position across restarts
    #[arg(long)]
    state: Option<PathBuf>,

    /// Use a virtual dial read from stdin and a virtual relay bank
    #[arg(long)]
    simulate: bool,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "dialtuner={0},dial_core={0},dial_hw={0},dial_sim={0}",
                    default_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(state) = args.state {
        settings.state_path = Some(state);
    }

    if args.print_config {
        let json = serde_json::to_string_pretty(&settings).context("failed to encode settings")?;
        println!("{}", json);
        return Ok(());
    }

    tracing::info!("Starting dialtuner {}", env!("CARGO_PKG_VERSION"));

    if args.simulate {
        runner::run_simulated(settings).await
    } else {
        runner::run_hardware(settings).await
    }
}
