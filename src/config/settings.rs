//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::{MAX_SEMITONES, MIN_SEMITONES};
use crate::codec::TranscodeRecipe;
use crate::source::InputMode;

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

/// Settings for capture and live playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Input mode preselected at startup.
    pub input_mode: InputMode,
    /// Play the processed signal back through the default output while
    /// recording.
    pub monitor_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Microphone,
            monitor_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PitchSettings
// ---------------------------------------------------------------------------

/// Settings for the pitch-shift effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitchSettings {
    /// Semitone offset applied when a session starts (clamped to ±12).
    pub default_semitones: f32,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            default_semitones: 0.0,
        }
    }
}

impl PitchSettings {
    /// The default offset, forced into the supported range.
    pub fn clamped(&self) -> f32 {
        if self.default_semitones.is_finite() {
            self.default_semitones.clamp(MIN_SEMITONES, MAX_SEMITONES)
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// CodecSettings
// ---------------------------------------------------------------------------

/// Settings for the transcoding engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Explicit path to the `ffmpeg` binary — `None` means look it up on
    /// `PATH`.
    pub ffmpeg_path: Option<String>,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Target bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

impl Default for CodecSettings {
    fn default() -> Self {
        let recipe = TranscodeRecipe::default();
        Self {
            ffmpeg_path: None,
            sample_rate: recipe.sample_rate,
            channels: recipe.channels,
            bitrate_kbps: recipe.bitrate_kbps,
        }
    }
}

impl CodecSettings {
    /// The recipe these settings describe.
    pub fn recipe(&self) -> TranscodeRecipe {
        TranscodeRecipe {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bitrate_kbps: self.bitrate_kbps,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputSettings
// ---------------------------------------------------------------------------

/// Settings for artifact publication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory recordings are published into — `None` means the platform
    /// music directory (see [`AppPaths`]).
    pub directory: Option<String>,
}

impl OutputSettings {
    /// The resolved output directory.
    pub fn resolved_dir(&self) -> std::path::PathBuf {
        match &self.directory {
            Some(dir) => std::path::PathBuf::from(dir),
            None => AppPaths::new().output_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use tuned::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture and playback settings.
    pub audio: AudioSettings,
    /// Pitch-shift effect settings.
    pub pitch: PitchSettings,
    /// Transcoding engine settings.
    pub codec: CodecSettings,
    /// Artifact publication settings.
    pub output: OutputSettings,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
