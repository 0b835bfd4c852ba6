//! Configuration management
//!
//! Settings are loaded from a single TOML file. Enum-valued settings
//! (`background`, `chooser`) are strict: an unknown value fails loading with
//! a descriptive error before any audio subsystem starts. Numeric ranges are
//! validated after parsing.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hard upper bound on echo layers.
pub const MAX_ECHOES_LIMIT: usize = 3;

/// Background audio selection.
///
/// Maps to a fixed file under the background asset directory. `None`
/// disables the background player entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundAudio {
    #[default]
    Tone,
    Noise,
    None,
}

impl BackgroundAudio {
    /// Resolve to an audio file path inside `background_dir`, if enabled.
    pub fn filepath(&self, background_dir: &Path) -> Option<PathBuf> {
        match self {
            BackgroundAudio::Tone => Some(background_dir.join("tone.wav")),
            BackgroundAudio::Noise => Some(background_dir.join("noise.wav")),
            BackgroundAudio::None => None,
        }
    }
}

/// Line selection policy.
///
/// See [`crate::lines::chooser`] for the behavior of each policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChooserPolicy {
    #[default]
    Sequential,
    SequentialRefreshing,
    Shuffled,
    Random,
}

impl fmt::Display for ChooserPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChooserPolicy::Sequential => "sequential",
            ChooserPolicy::SequentialRefreshing => "sequential_refreshing",
            ChooserPolicy::Shuffled => "shuffled",
            ChooserPolicy::Random => "random",
        };
        f.write_str(name)
    }
}

/// Effect parameters shared by live playback channels and the mix renderer.
#[derive(Debug, Clone, Copy)]
pub struct EffectParams {
    /// Base voice pitch shift in semitones (signed)
    pub initial_pitch_shift: f32,
    /// Number of echo layers (0 disables echoes)
    pub max_echoes: usize,
    /// Delay step between echo layers, seconds
    pub echo_delay: f64,
}

impl EffectParams {
    /// Tail length needed for the longest echo to ring out, seconds.
    pub fn tail_seconds(&self) -> f64 {
        self.max_echoes as f64 * self.echo_delay
    }
}

fn default_initial_line_delay() -> f64 {
    15.0
}

fn default_initial_pitch_shift() -> f32 {
    -1.44
}

fn default_max_echoes() -> usize {
    2
}

fn default_echo_delay() -> f64 {
    1.5
}

fn default_mantra_start_delay() -> f64 {
    45.0
}

fn default_tts_command() -> String {
    "espeak-ng".to_string()
}

fn default_line_dir() -> PathBuf {
    PathBuf::from("./import/lines")
}

fn default_background_dir() -> PathBuf {
    PathBuf::from("./import/background")
}

/// Application settings loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Background audio to loop under the lines
    #[serde(default)]
    pub background: BackgroundAudio,

    /// Line selection policy
    #[serde(default)]
    pub chooser: ChooserPolicy,

    /// Delay before the first line starts, seconds
    #[serde(default = "default_initial_line_delay")]
    pub initial_line_delay: f64,

    /// Base voice pitch shift, semitones
    #[serde(default = "default_initial_pitch_shift")]
    pub initial_pitch_shift: f32,

    /// Number of echo layers per line (0-3)
    #[serde(default = "default_max_echoes")]
    pub max_echoes: usize,

    /// Delay step between echo layers, seconds
    #[serde(default = "default_echo_delay")]
    pub echo_delay: f64,

    /// Mantra audio file (absent = no mantra)
    #[serde(default)]
    pub mantra_filepath: Option<PathBuf>,

    /// Delay after lines start before the mantra begins, seconds
    #[serde(default = "default_mantra_start_delay")]
    pub mantra_start_delay: f64,

    /// External text-to-speech command (must accept `-w <wav> <text>`)
    #[serde(default = "default_tts_command")]
    pub tts_command: String,

    /// Directory for generated line audio
    #[serde(default = "default_line_dir")]
    pub line_dir: PathBuf,

    /// Directory containing background tone/noise files
    #[serde(default = "default_background_dir")]
    pub background_dir: PathBuf,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file is missing, is not valid TOML,
    /// names an unknown background/chooser, or contains out-of-range values.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;

        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;

        settings.validate()?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    /// Validate numeric ranges.
    pub fn validate(&self) -> Result<()> {
        if self.initial_line_delay < 0.0 {
            return Err(Error::Config(format!(
                "initial_line_delay must be >= 0, got {}",
                self.initial_line_delay
            )));
        }
        if self.echo_delay < 0.0 {
            return Err(Error::Config(format!(
                "echo_delay must be >= 0, got {}",
                self.echo_delay
            )));
        }
        if self.mantra_start_delay < 0.0 {
            return Err(Error::Config(format!(
                "mantra_start_delay must be >= 0, got {}",
                self.mantra_start_delay
            )));
        }
        if self.max_echoes > MAX_ECHOES_LIMIT {
            return Err(Error::Config(format!(
                "max_echoes must be <= {}, got {}",
                MAX_ECHOES_LIMIT, self.max_echoes
            )));
        }
        Ok(())
    }

    /// Effect parameters derived from these settings.
    pub fn effect_params(&self) -> EffectParams {
        EffectParams {
            initial_pitch_shift: self.initial_pitch_shift,
            max_echoes: self.max_echoes,
            echo_delay: self.echo_delay,
        }
    }

    /// Resolved background audio path, if a background is selected.
    pub fn background_path(&self) -> Option<PathBuf> {
        self.background.filepath(&self.background_dir)
    }
}
