//! Application settings.
//!
//! Settings are loaded once at bootstrap from an optional TOML file and
//! passed explicitly into the pipeline — nothing reads ambient global
//! state after initialization. Every field has a serde default so a
//! partial (or missing) file works.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ports::ListenParams;

/// Default phrase that ends the conversation (compared case-insensitively).
pub const DEFAULT_EXIT_PHRASE: &str = "exit";

/// Default persona preamble prepended to every prompt.
pub const DEFAULT_PERSONA: &str = "You are a witty AI assistant. Keep responses concise and \
     entertaining with a hint of sarcasm in your answer.";

/// Errors from loading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML.
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Compute device for synthesis-model inference.
///
/// Resolved once during initialization and passed explicitly to the
/// synthesis backend; never read from ambient global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// CPU inference.
    #[default]
    Cpu,

    /// CUDA-capable accelerator.
    Cuda,
}

impl std::fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// When ambient-noise calibration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPolicy {
    /// Calibrate once when the loop starts.
    #[default]
    Startup,

    /// Re-calibrate before every listening attempt.
    EveryTurn,
}

/// Language-model (Ollama) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Base URL of the Ollama server.
    pub base_url: String,

    /// Model name passed to the generate endpoint.
    pub model: String,

    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_owned(),
            model: "llama3.2:3b".to_owned(),
            request_timeout_ms: 120_000,
        }
    }
}

impl OllamaSettings {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Persona preamble prepended to every prompt. Empty disables it.
    pub persona: String,

    /// Utterance that ends the conversation (case-insensitive).
    pub exit_phrase: String,

    /// How long to wait for speech to start, in milliseconds.
    pub listen_timeout_ms: u64,

    /// Hard cap on a single utterance, in milliseconds.
    pub phrase_time_limit_ms: u64,

    /// Trailing silence that ends an utterance, in milliseconds.
    pub pause_threshold_ms: u64,

    /// RMS energy above which a frame counts as speech (normalized f32
    /// samples). Raise in noisy environments.
    pub energy_threshold: f32,

    /// When ambient-noise calibration runs.
    pub calibration: CalibrationPolicy,

    /// Number of response workers (concurrent generate+synthesize turns).
    pub workers: usize,

    /// Bound on waiting for in-flight workers at shutdown, in milliseconds.
    pub drain_timeout_ms: u64,

    /// Compute device for synthesis inference.
    pub device: ComputeDevice,

    /// Directory holding the model files. Defaults to the platform data
    /// directory (`…/quip/models`).
    pub models_dir: Option<PathBuf>,

    /// Numeric speaker ID of the synthesis voice.
    pub speaker_id: i32,

    /// Synthesis speed multiplier (1.0 = normal).
    pub speed: f32,

    /// Language-model connection settings.
    pub ollama: OllamaSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_owned(),
            exit_phrase: DEFAULT_EXIT_PHRASE.to_owned(),
            listen_timeout_ms: 5_000,
            phrase_time_limit_ms: 10_000,
            pause_threshold_ms: 800,
            energy_threshold: 0.01,
            calibration: CalibrationPolicy::default(),
            workers: 2,
            drain_timeout_ms: 30_000,
            device: ComputeDevice::default(),
            models_dir: None,
            speaker_id: 0,
            speed: 1.0,
            ollama: OllamaSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load settings from `path` if given, otherwise from the default
    /// config location if it exists, otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_config_path() {
            Some(default) if default.exists() => Self::load(&default),
            _ => Ok(Self::default()),
        }
    }

    /// Platform default location of the settings file.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quip").join("quip.toml"))
    }

    /// Directory holding the model files.
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("quip")
                .join("models")
        })
    }

    /// Directory holding the synthesis (TTS) model files.
    #[must_use]
    pub fn tts_model_dir(&self) -> PathBuf {
        self.models_dir().join("tts")
    }

    /// Directory holding the recognition (STT) model files.
    #[must_use]
    pub fn stt_model_dir(&self) -> PathBuf {
        self.models_dir().join("stt")
    }

    /// Listening parameters for the recognizer port.
    #[must_use]
    pub const fn listen_params(&self) -> ListenParams {
        ListenParams {
            timeout: Duration::from_millis(self.listen_timeout_ms),
            phrase_time_limit: Duration::from_millis(self.phrase_time_limit_ms),
        }
    }

    /// Trailing-silence duration that ends an utterance.
    #[must_use]
    pub const fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    /// Bound on waiting for in-flight workers at shutdown.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
