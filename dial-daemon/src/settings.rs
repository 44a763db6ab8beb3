//! Daemon settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use dial_core::{ChannelEntry, ChannelMap, ConfigError};
use dial_hw::RelayPins;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::PlayerSettings;

/// Errors loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for this schema
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Channel table override is invalid
    #[error("invalid channel table: {0}")]
    Channels(#[from] ConfigError),
}

/// GPIO pin assignment for the relays (BCM numbering)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PinSettings {
    pub up: u32,
    pub down: u32,
    pub source: u32,
}

impl Default for PinSettings {
    fn default() -> Self {
        let pins = RelayPins::default();
        Self {
            up: pins.up,
            down: pins.down,
            source: pins.source,
        }
    }
}

impl From<PinSettings> for RelayPins {
    fn from(p: PinSettings) -> Self {
        RelayPins {
            up: p.up,
            down: p.down,
            source: p.source,
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// I2C bus the encoder is on
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    /// Encoder slave address
    #[serde(default = "default_i2c_address")]
    pub i2c_address: u16,
    /// Relay pin assignment
    #[serde(default)]
    pub relay_pins: PinSettings,
    /// Delay after every relay action (ms)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Dial poll period (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Where the tuner position is persisted
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    /// Channel table override
    #[serde(default)]
    pub channels: Option<Vec<ChannelEntry>>,
    /// Media player for the HDMI channel
    #[serde(default)]
    pub player: Option<PlayerSettings>,
}

fn default_i2c_bus() -> u8 {
    dial_hw::DEFAULT_BUS
}

fn default_i2c_address() -> u16 {
    dial_hw::DEFAULT_ADDRESS
}

fn default_settle_ms() -> u64 {
    dial_core::DEFAULT_SETTLE.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            i2c_bus: default_i2c_bus(),
            i2c_address: default_i2c_address(),
            relay_pins: PinSettings::default(),
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            state_path: None,
            channels: None,
            player: None,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for dialtuner
    /// Uses $XDG_CONFIG_HOME/dialtuner, falls back to ~/.config/dialtuner
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("dialtuner"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("dialtuner"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Channel table, built-in unless overridden
    pub fn channel_map(&self) -> Result<ChannelMap, SettingsError> {
        match &self.channels {
            Some(entries) => Ok(ChannelMap::new(entries.clone())?),
            None => Ok(ChannelMap::default()),
        }
    }

    /// State file path
    ///
    /// Defaults to `$XDG_STATE_HOME/dialtuner/state.json`, or the working
    /// directory when no state directory is known.
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.state_path {
            return path.clone();
        }
        dirs::state_dir()
            .map(|d| d.join("dialtuner").join("state.json"))
            .unwrap_or_else(|| PathBuf::from("dialtuner-state.json"))
    }

    /// Relay settle delay
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Poll period (never zero)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_hardware() {
        let s = Settings::default();
        assert_eq!(s.i2c_bus, 1);
        assert_eq!(s.i2c_address, 0x08);
        assert_eq!(RelayPins::from(s.relay_pins), RelayPins::default());
        assert_eq!(s.settle(), Duration::from_millis(20));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"settle_ms": 35, "relay_pins": {"up": 5, "down": 6, "source": 13}}"#)
            .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.settle_ms, 35);
        assert_eq!(s.relay_pins.source, 13);
        assert_eq!(s.poll_interval_ms, 10);
        assert!(s.channels.is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Settings::load_from(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ settle_ms: ").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_channel_override() {
        let s: Settings = serde_json::from_str(
            r#"{"channels": [{"channel": 1, "position": 0}, {"channel": 2, "position": 4, "frequency": 7}]}"#,
        )
        .unwrap();

        let map = s.channel_map().unwrap();
        assert_eq!(map.lookup(4).and_then(|m| m.frequency), Some(7));
        assert_eq!(map.lookup(18), None);
    }

    #[test]
    fn test_invalid_channel_override() {
        let s: Settings =
            serde_json::from_str(r#"{"channels": [{"channel": 0, "position": 0}]}"#).unwrap();
        assert!(matches!(s.channel_map(), Err(SettingsError::Channels(_))));
    }

    #[test]
    fn test_player_section() {
        let s: Settings = serde_json::from_str(
            r#"{"player": {"show_titles": true, "media": {"path": "/media/00-30-00_Loop.mp4", "title": "Late Show"}}}"#,
        )
        .unwrap();

        let player = s.player.unwrap();
        assert!(player.show_titles);
        assert_eq!(player.title_duration, 10);
        assert_eq!(player.binary, "omxplayer");
        assert_eq!(player.media.repeats, -1);
        assert_eq!(player.media.title.as_deref(), Some("Late Show"));
    }

    #[test]
    fn test_explicit_state_path_wins() {
        let s = Settings {
            state_path: Some(PathBuf::from("/var/lib/dialtuner/state.json")),
            ..Default::default()
        };
        assert_eq!(s.state_path(), PathBuf::from("/var/lib/dialtuner/state.json"));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let s = Settings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(s.poll_interval(), Duration::from_millis(1));
    }
}
