//! Sherpa-ONNX TTS backend — implements [`SynthBackend`] via `sherpa-rs`.
//!
//! Loads a Kokoro-family ONNX voice model from a directory. The engine's
//! `create` method requires `&mut self`, which the [`SynthBackend`] trait
//! already exposes; exclusive access is enforced one level up by the
//! shared-model lock in [`SynthesisStage`](crate::synth::SynthesisStage).

use std::path::Path;

use sherpa_rs::tts::{KokoroTts, KokoroTtsConfig};

use crate::backend::{SynthAudio, SynthBackend};
use crate::error::SynthesisError;
use quip_core::settings::ComputeDevice;

/// Configuration for the sherpa TTS backend.
#[derive(Debug, Clone)]
pub struct SherpaTtsConfig {
    /// Numeric speaker ID (index into the packed voice-style matrix).
    pub speaker_id: i32,

    /// Speech speed multiplier (0.5–2.0, default 1.0).
    pub speed: f32,

    /// Compute device resolved at initialization.
    pub device: ComputeDevice,
}

impl Default for SherpaTtsConfig {
    fn default() -> Self {
        Self {
            speaker_id: 0,
            speed: 1.0,
            device: ComputeDevice::Cpu,
        }
    }
}

/// Sherpa-ONNX TTS backend.
pub struct SherpaTtsBackend {
    /// The loaded sherpa-onnx TTS engine.
    engine: KokoroTts,

    /// Numeric speaker ID passed to every create call.
    speaker_id: i32,

    /// Speech speed multiplier.
    speed: f32,

    /// Output sample rate reported after the first synthesis (falls back
    /// to the model family's nominal rate before that).
    sample_rate: u32,
}

/// Nominal output rate of the supported model family, used until the
/// engine reports the real rate with its first result.
const NOMINAL_SAMPLE_RATE: u32 = 22_050;

impl SherpaTtsBackend {
    /// Load the TTS model from a directory.
    ///
    /// The directory must contain:
    /// - `model.onnx` — the voice model
    /// - `voices.bin` — packed voice style embeddings
    /// - `tokens.txt` — tokenizer vocabulary
    /// - `espeak-ng-data/` — lexicon data
    pub fn load(model_dir: &Path, config: &SherpaTtsConfig) -> Result<Self, SynthesisError> {
        if !model_dir.exists() {
            return Err(SynthesisError::ModelNotFound(model_dir.to_path_buf()));
        }

        let model_path = model_dir.join("model.onnx");
        let voices_path = model_dir.join("voices.bin");
        let tokens_path = model_dir.join("tokens.txt");
        let data_dir = model_dir.join("espeak-ng-data");

        for path in [&model_path, &voices_path, &tokens_path] {
            if !path.exists() {
                return Err(SynthesisError::ModelNotFound(path.clone()));
            }
        }

        tracing::info!(
            dir = %model_dir.display(),
            speaker_id = config.speaker_id,
            speed = config.speed,
            device = %config.device,
            "loading TTS model"
        );

        let sherpa_config = KokoroTtsConfig {
            model: path_to_string(&model_path)?,
            voices: path_to_string(&voices_path)?,
            tokens: path_to_string(&tokens_path)?,
            data_dir: path_to_string(&data_dir)?,
            length_scale: config.speed,
            ..Default::default()
        };

        let engine = KokoroTts::new(sherpa_config);

        tracing::info!("TTS model loaded");

        Ok(Self {
            engine,
            speaker_id: config.speaker_id,
            speed: config.speed,
            sample_rate: NOMINAL_SAMPLE_RATE,
        })
    }
}

impl SynthBackend for SherpaTtsBackend {
    fn synthesize(&mut self, text: &str) -> Result<SynthAudio, SynthesisError> {
        let audio = self
            .engine
            .create(text, self.speaker_id, self.speed)
            .map_err(|e| SynthesisError::Model(format!("{e}")))?;

        self.sample_rate = audio.sample_rate;

        Ok(SynthAudio {
            samples: audio.samples,
            sample_rate: audio.sample_rate,
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Convert a path to a string, rejecting invalid UTF-8.
fn path_to_string(path: &Path) -> Result<String, SynthesisError> {
    path.to_str()
        .map(ToString::to_string)
        .ok_or_else(|| SynthesisError::ModelLoad(format!("invalid path: {}", path.display())))
}
