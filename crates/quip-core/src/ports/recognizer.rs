//! Speech-recognition port.

use std::time::Duration;

use async_trait::async_trait;

/// Parameters for a single listening attempt.
#[derive(Debug, Clone, Copy)]
pub struct ListenParams {
    /// How long to wait for speech to start before giving up.
    pub timeout: Duration,

    /// Hard cap on the length of a single utterance once speech started.
    pub phrase_time_limit: Duration,
}

impl Default for ListenParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(10),
        }
    }
}

/// Errors from a speech-recognition collaborator.
///
/// All variants are recoverable: the listen loop logs them and retries.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    /// Audio was captured but could not be decoded into text.
    #[error("speech was not recognized")]
    Unrecognized,

    /// The capture device or the recognition backend failed.
    #[error("speech recognition unavailable: {0}")]
    ServiceUnavailable(String),

    /// No speech started within the configured timeout.
    #[error("listening timed out")]
    TimedOut,
}

/// A collaborator that captures one spoken utterance and transcribes it.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Measure ambient noise and adjust the detection threshold.
    ///
    /// Called once at startup or once per loop iteration depending on the
    /// configured [`CalibrationPolicy`](crate::settings::CalibrationPolicy).
    /// The default implementation is a no-op for backends that calibrate
    /// themselves.
    async fn calibrate(&self) -> Result<(), RecognitionError> {
        Ok(())
    }

    /// Block until one utterance is captured and transcribed, or until
    /// `params.timeout` elapses with no speech.
    async fn listen(&self, params: &ListenParams) -> Result<String, RecognitionError>;
}
