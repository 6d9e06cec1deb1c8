//! Speech synthesis stage.
//!
//! Converts reply text into a 16-bit PCM [`AudioBuffer`]. The stage is
//! stateless with respect to the pipeline — it owns no queue — but it
//! guards the one piece of state that must never be raced: the loaded
//! synthesis model. Models are not reentrant-safe across concurrent calls
//! sharing the same device context, so every call acquires the shared
//! mutex for the full duration of inference.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use quip_core::domain::AudioBuffer;
use quip_core::settings::ComputeDevice;

use crate::backend::{SynthAudio, SynthBackend};
use crate::error::SynthesisError;

/// The loaded synthesis model, access-serialized across all callers.
///
/// Injected into [`SynthesisStage`] as an explicit handle rather than held
/// in a module-level singleton, so the serialization requirement is
/// visible at every call site.
pub struct SharedModel {
    backend: Box<dyn SynthBackend>,
    device: ComputeDevice,
}

/// Exclusively-locked handle to the shared model.
pub type SharedModelHandle = Arc<Mutex<SharedModel>>;

impl SharedModel {
    /// Wrap a loaded backend into a lockable shared handle.
    pub fn into_handle(backend: Box<dyn SynthBackend>, device: ComputeDevice) -> SharedModelHandle {
        tracing::info!(%device, "synthesis model ready");
        Arc::new(Mutex::new(Self { backend, device }))
    }

    /// The compute device this model was loaded for.
    #[must_use]
    pub const fn device(&self) -> ComputeDevice {
        self.device
    }
}

/// Converts text into playable PCM audio through the shared model.
///
/// Cheap to clone: clones share the same model handle and therefore the
/// same lock.
#[derive(Clone)]
pub struct SynthesisStage {
    model: SharedModelHandle,
}

impl SynthesisStage {
    /// Create a stage over an injected shared-model handle.
    #[must_use]
    pub fn new(model: SharedModelHandle) -> Self {
        Self { model }
    }

    /// Synthesize `text` into a 16-bit PCM buffer.
    ///
    /// Fails with [`SynthesisError::EmptyText`] before any model work if
    /// `text` is empty or whitespace-only. The model lock is held for the
    /// whole inference call and released on every exit path. Inference is
    /// CPU-bound, so it runs on the blocking thread pool.
    pub async fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let model = Arc::clone(&self.model);
        let text = text.to_owned();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| SynthesisError::Model(format!("model lock poisoned: {e}")))?;

            let started = Instant::now();
            let audio = guard.backend.synthesize(&text)?;
            let elapsed_ms = started.elapsed().as_millis();

            tracing::debug!(
                elapsed_ms,
                samples = audio.samples.len(),
                sample_rate = audio.sample_rate,
                "audio generated"
            );

            Ok(to_pcm16(&audio))
        })
        .await
        .map_err(|e| SynthesisError::Model(format!("synthesis task join error: {e}")))?
    }

    /// Prime the model by synthesizing a few short inputs.
    ///
    /// Pages weights into memory so the first real reply does not pay the
    /// cold-start cost. Output is discarded.
    pub async fn warm_up(&self, iterations: usize) -> Result<(), SynthesisError> {
        let started = Instant::now();
        for i in 0..iterations {
            self.synthesize(&i.to_string()).await?;
        }
        tracing::info!(
            iterations,
            elapsed_ms = started.elapsed().as_millis(),
            "synthesis model warmed up"
        );
        Ok(())
    }
}

/// Scale f32 samples into the signed 16-bit PCM range.
fn to_pcm16(audio: &SynthAudio) -> AudioBuffer {
    #[allow(clippy::cast_possible_truncation)]
    let samples = audio
        .samples
        .iter()
        .map(|&s| (s * 32_768.0).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16)
        .collect();

    AudioBuffer::new(samples, audio.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        samples: Vec<f32>,
        calls: usize,
    }

    impl SynthBackend for FixedBackend {
        fn synthesize(&mut self, _text: &str) -> Result<SynthAudio, SynthesisError> {
            self.calls += 1;
            Ok(SynthAudio {
                samples: self.samples.clone(),
                sample_rate: 22_050,
            })
        }

        fn sample_rate(&self) -> u32 {
            22_050
        }
    }

    fn stage_with(samples: Vec<f32>) -> SynthesisStage {
        let backend = Box::new(FixedBackend { samples, calls: 0 });
        SynthesisStage::new(SharedModel::into_handle(backend, ComputeDevice::Cpu))
    }

    #[tokio::test]
    async fn empty_text_fails_before_model_work() {
        let stage = stage_with(vec![0.5]);
        assert!(matches!(
            stage.synthesize("").await,
            Err(SynthesisError::EmptyText)
        ));
        assert!(matches!(
            stage.synthesize("   \n").await,
            Err(SynthesisError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn scales_to_pcm16() {
        let stage = stage_with(vec![0.0, 0.5, -0.5, 2.0, -2.0]);
        let buffer = stage.synthesize("hello").await.unwrap();

        assert_eq!(buffer.sample_rate, 22_050);
        assert_eq!(buffer.samples[0], 0);
        assert_eq!(buffer.samples[1], 16_384);
        assert_eq!(buffer.samples[2], -16_384);
        // out-of-range input clamps instead of wrapping
        assert_eq!(buffer.samples[3], i16::MAX);
        assert_eq!(buffer.samples[4], i16::MIN);
    }

    #[tokio::test]
    async fn repeated_synthesis_has_stable_shape() {
        let stage = stage_with(vec![0.1; 441]);

        let first = stage.synthesize("same text").await.unwrap();
        let second = stage.synthesize("same text").await.unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(first.sample_rate, second.sample_rate);
    }

    #[tokio::test]
    async fn warm_up_runs_requested_iterations() {
        let stage = stage_with(vec![0.1]);
        stage.warm_up(4).await.unwrap();
    }
}
