//! Media player for the HDMI channel
//!
//! While the dial rests on the HDMI channel the Pi's own video output is on
//! screen, so the daemon loops a video there. Playback is delegated to an
//! external `omxplayer` process.
//!
//! Videos are named with their running time as a prefix
//! (`01-12-23_Name.mp4` is 1h 12m 23s long). Playback starts at the offset
//! the video would have reached had it been looping since the daemon
//! started, so switching back to the channel looks like live television.
//!
//! With `show_titles` on, a media title is overlaid through a one-cue
//! subtitle file written to a private temporary directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from the media player
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Unknown audio output setting
    #[error("unknown sound output {0:?} (expected hdmi, local, both or alsa)")]
    InvalidSound(String),

    /// Media file name does not carry a `HH-MM-SS_` length prefix
    #[error("cannot read running time from {0:?}")]
    BadMediaName(String),

    /// Player process could not be started or controlled
    #[error("player process error: {0}")]
    Process(#[from] std::io::Error),
}

/// A video to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Path to the video file
    pub path: PathBuf,
    /// Loop count; negative loops forever
    #[serde(default = "default_repeats")]
    pub repeats: i32,
    /// Title overlaid while `show_titles` is on
    #[serde(default)]
    pub title: Option<String>,
}

fn default_repeats() -> i32 {
    -1
}

impl Media {
    #[cfg(test)]
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            repeats: default_repeats(),
            title: None,
        }
    }

    /// Running time encoded in the file name prefix
    pub fn running_time(&self) -> Result<Duration, PlayerError> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bad = || PlayerError::BadMediaName(name.clone());

        let prefix = name.split('_').next().ok_or_else(bad)?;
        let parts: Vec<u64> = prefix
            .split('-')
            .map(|p| p.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad())?;

        match parts.as_slice() {
            [h, m, s] => Ok(Duration::from_secs(h * 3600 + m * 60 + s)),
            _ => Err(bad()),
        }
    }
}

/// Player settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSettings {
    /// Player executable
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Audio output: hdmi, local, both or alsa
    #[serde(default = "default_sound")]
    pub sound: String,
    /// ALSA card and device, used when sound is "alsa"
    #[serde(default)]
    pub alsa_hw_device: Option<(u32, u32)>,
    /// Comma-separated list of playable extensions
    #[serde(default = "default_extensions")]
    pub extensions: String,
    /// Extra player arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Playback volume (millibels, 0 = player default)
    #[serde(default)]
    pub volume: i32,
    /// Overlay the media title
    #[serde(default)]
    pub show_titles: bool,
    /// How long the title stays up (seconds); negative keeps it up
    #[serde(default = "default_title_duration")]
    pub title_duration: i64,
    /// Video looped on the HDMI channel
    pub media: Media,
}

fn default_binary() -> String {
    "omxplayer".to_string()
}

fn default_sound() -> String {
    "both".to_string()
}

fn default_extensions() -> String {
    "avi, mov, mkv, mp4, m4v".to_string()
}

fn default_title_duration() -> i64 {
    10
}

/// Something that can play a video
pub trait MediaPlayer: Send {
    /// Start playing, replacing anything already playing
    fn play(&mut self, media: &Media, loop_count: Option<i32>, volume: i32)
        -> Result<(), PlayerError>;

    /// Toggle pause
    fn pause(&mut self) -> Result<(), PlayerError>;

    /// Stop playback, waiting up to `timeout` for the player to exit
    fn stop(&mut self, timeout: Duration);

    /// Whether a player process is running
    fn is_playing(&mut self) -> bool;

    /// File extensions this player accepts (lowercase, no dot)
    fn supported_extensions(&self) -> BTreeSet<String>;
}

/// omxplayer process wrapper
#[derive(Debug)]
pub struct OmxPlayer {
    binary: String,
    sound: String,
    extensions: BTreeSet<String>,
    extra_args: Vec<String>,
    /// SRT timing line for the title cue, when titles are shown
    subtitle_header: Option<String>,
    temp_dir: Option<TempDir>,
    started: Instant,
    process: Option<Child>,
}

/// How long `play` waits for a previous player to exit
const RESTART_TIMEOUT: Duration = Duration::from_secs(3);

impl OmxPlayer {
    /// Create a player from settings
    pub fn new(settings: &PlayerSettings) -> Result<Self, PlayerError> {
        let sound = match settings.sound.to_lowercase().as_str() {
            "alsa" => match settings.alsa_hw_device {
                Some((card, device)) => format!("alsa:hw:{},{}", card, device),
                None => "alsa".to_string(),
            },
            s @ ("hdmi" | "local" | "both") => s.to_string(),
            _ => return Err(PlayerError::InvalidSound(settings.sound.clone())),
        };

        Ok(Self {
            binary: settings.binary.clone(),
            sound,
            extensions: parse_extensions(&settings.extensions),
            extra_args: settings.extra_args.clone(),
            subtitle_header: settings
                .show_titles
                .then(|| subtitle_header(settings.title_duration)),
            temp_dir: None,
            started: Instant::now(),
            process: None,
        })
    }

    /// Argument list for playing `media` after `elapsed` since start-up
    pub fn assemble_args(
        &self,
        media: &Media,
        loop_count: Option<i32>,
        volume: i32,
        elapsed: Duration,
        subtitles: Option<&Path>,
    ) -> Result<Vec<String>, PlayerError> {
        let length = media.running_time()?;
        let offset = if length.is_zero() {
            0
        } else {
            elapsed.as_secs() % length.as_secs()
        };

        let mut args = vec![
            "-o".to_string(),
            self.sound.clone(),
            "-l".to_string(),
            format_hms(offset),
        ];
        args.extend(self.extra_args.iter().cloned());
        if volume != 0 {
            args.push("--vol".to_string());
            args.push(volume.to_string());
        }
        if loop_count.unwrap_or(media.repeats) <= -1 {
            args.push("--loop".to_string());
        }
        if let Some(srt) = subtitles {
            args.push("--subtitles".to_string());
            args.push(srt.to_string_lossy().into_owned());
        }
        args.push(media.path.to_string_lossy().into_owned());
        Ok(args)
    }

    /// Write the title cue for `media`, if titles are on and it has one
    fn write_subtitles(&mut self, media: &Media) -> Result<Option<PathBuf>, PlayerError> {
        let (Some(header), Some(title)) = (&self.subtitle_header, &media.title) else {
            return Ok(None);
        };
        if title.is_empty() {
            return Ok(None);
        }

        let dir = match self.temp_dir.take() {
            Some(dir) => dir,
            None => tempfile::tempdir()?,
        };
        let path = dir.path().join("dialtuner.srt");
        self.temp_dir = Some(dir);
        fs::write(&path, format!("{}{}", header, title))?;
        Ok(Some(path))
    }

    fn send_key(&mut self, key: &str) -> Result<(), PlayerError> {
        if !self.is_playing() {
            return Ok(());
        }
        if let Some(stdin) = self.process.as_mut().and_then(|p| p.stdin.as_mut()) {
            stdin.write_all(key.as_bytes())?;
            stdin.flush()?;
        }
        Ok(())
    }

    fn process_name(&self) -> &str {
        Path::new(&self.binary)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.binary)
    }
}

impl MediaPlayer for OmxPlayer {
    fn play(
        &mut self,
        media: &Media,
        loop_count: Option<i32>,
        volume: i32,
    ) -> Result<(), PlayerError> {
        self.stop(RESTART_TIMEOUT);

        let subtitles = self.write_subtitles(media)?;
        let args = self.assemble_args(
            media,
            loop_count,
            volume,
            self.started.elapsed(),
            subtitles.as_deref(),
        )?;
        info!("Playing {}", media.path.display());
        debug!("{} {}", self.binary, args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.send_key("p")
    }

    fn stop(&mut self, timeout: Duration) {
        if !self.is_playing() {
            self.process = None;
            return;
        }

        // omxplayer forks a helper binary; kill both by name
        match Command::new("pkill")
            .args(["-9", self.process_name()])
            .status()
        {
            Ok(_) => {}
            Err(e) => {
                warn!("pkill failed ({}), killing player directly", e);
                if let Some(child) = self.process.as_mut() {
                    let _ = child.kill();
                }
            }
        }

        let start = Instant::now();
        while self.is_playing() && start.elapsed() < timeout {
            thread::sleep(Duration::from_millis(10));
        }

        if let Some(mut child) = self.process.take() {
            if matches!(child.try_wait(), Ok(None)) {
                warn!("Player still running after {:?}, killing it", timeout);
                let _ = child.kill();
            }
            if let Err(e) = child.wait() {
                warn!("Failed to reap player: {}", e);
            }
        }
        info!("Player stopped");
    }

    fn is_playing(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn supported_extensions(&self) -> BTreeSet<String> {
        self.extensions.clone()
    }
}

/// Parse "avi, .MOV,mkv" into {"avi", "mov", "mkv"}
fn parse_extensions(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(|e| {
            e.chars()
                .filter(|c| !c.is_whitespace() && *c != '.')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|e| !e.is_empty())
        .collect()
}

/// SRT timing line showing a cue from the start for `duration` seconds
fn subtitle_header(duration: i64) -> String {
    match u64::try_from(duration) {
        Ok(secs) => format!(
            "00:00:00,00 --> {}:{:02}:{:02},00\n",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ),
        Err(_) => "00:00:00,00 --> 99:59:59,00\n".to_string(),
    }
}

fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
