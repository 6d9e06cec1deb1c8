//! Speech engine backend traits — engine-agnostic interfaces for STT and TTS.
//!
//! The pipeline operates on trait objects so that engines can be swapped
//! without touching the pipeline logic, and so that tests can inject
//! instrumented fakes.
//!
//! | Feature  | Module                         | STT | TTS |
//! |----------|--------------------------------|-----|-----|
//! | `sherpa` | [`sherpa_stt`], [`sherpa_tts`] |  ✓  |  ✓  |

#[cfg(feature = "sherpa")]
pub mod sherpa_stt;
#[cfg(feature = "sherpa")]
pub mod sherpa_tts;

use crate::error::SynthesisError;
use quip_core::ports::RecognitionError;

/// Raw audio produced by a synthesis backend, before PCM conversion.
#[derive(Debug, Clone)]
pub struct SynthAudio {
    /// PCM f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,

    /// Sample rate of the audio in Hz.
    pub sample_rate: u32,
}

/// Backend-agnostic text-to-speech engine.
///
/// Methods take `&mut self` because engine bindings typically require it;
/// the synthesis stage serializes access through the shared-model lock,
/// so a backend never sees two calls at once.
pub trait SynthBackend: Send {
    /// Synthesize `text` into raw audio.
    ///
    /// Callers guarantee `text` is non-empty; passing through the acoustic
    /// model and vocoder is an opaque step from the pipeline's viewpoint.
    fn synthesize(&mut self, text: &str) -> Result<SynthAudio, SynthesisError>;

    /// Output sample rate of the loaded model, in Hz.
    fn sample_rate(&self) -> u32;
}

/// Backend-agnostic speech-to-text engine.
///
/// # Arguments
/// `audio` is PCM f32 mono at 16 kHz.
pub trait SttBackend: Send {
    /// Transcribe audio samples to text.
    ///
    /// Returns an empty string when the audio contains no decodable
    /// speech; the recognizer maps that to
    /// [`RecognitionError::Unrecognized`].
    fn transcribe(&mut self, audio: &[f32]) -> Result<String, RecognitionError>;
}

/// Sample rate expected by the STT backends (16 kHz mono).
pub const STT_SAMPLE_RATE: u32 = 16_000;
