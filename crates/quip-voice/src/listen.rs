//! Listen loop — the single control loop of the pipeline.
//!
//! Repeatedly captures one utterance and submits it to the worker pool,
//! returning to listening immediately: the loop never waits for
//! generation, synthesis, or playback. The loop only terminates on the
//! configured exit phrase; collaborator errors are logged and retried.
//!
//! ```text
//!   Idle → Listening → (transcript | timeout | unrecognized) → Idle
//!                 │
//!                 └ exit phrase → ShuttingDown
//! ```

use std::sync::Arc;
use std::time::Duration;

use quip_core::ports::{ListenParams, RecognitionError, SpeechRecognizer};
use quip_core::settings::CalibrationPolicy;

use crate::playback::PlaybackQueue;
use crate::pool::ResponseWorkerPool;

/// Loop state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// Between listening attempts.
    Idle,

    /// Blocked on the microphone collaborator.
    Listening,

    /// Exit phrase heard; draining the pipeline.
    ShuttingDown,
}

/// Configuration for the listen loop.
#[derive(Debug, Clone)]
pub struct ListenLoopConfig {
    /// Utterance that ends the conversation (case-insensitive).
    pub exit_phrase: String,

    /// Listening parameters passed to the recognizer.
    pub params: ListenParams,

    /// When ambient-noise calibration runs.
    pub calibration: CalibrationPolicy,

    /// Bound on waiting for in-flight workers at shutdown.
    pub drain_timeout: Duration,
}

impl Default for ListenLoopConfig {
    fn default() -> Self {
        Self {
            exit_phrase: "exit".to_owned(),
            params: ListenParams::default(),
            calibration: CalibrationPolicy::default(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// The control loop: microphone → worker pool, plus orderly shutdown.
pub struct ListenLoop {
    recognizer: Arc<dyn SpeechRecognizer>,
    pool: ResponseWorkerPool,
    playback: PlaybackQueue,
    config: ListenLoopConfig,
    state: LoopState,
}

impl ListenLoop {
    /// Wire the loop to its collaborators.
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        pool: ResponseWorkerPool,
        playback: PlaybackQueue,
        config: ListenLoopConfig,
    ) -> Self {
        Self {
            recognizer,
            pool,
            playback,
            config,
            state: LoopState::Idle,
        }
    }

    /// Run until the exit phrase is heard, then shut the pipeline down.
    ///
    /// Collaborator errors never terminate the loop.
    pub async fn run(mut self) {
        tracing::info!(exit_phrase = %self.config.exit_phrase, "conversation started");

        if self.config.calibration == CalibrationPolicy::Startup {
            self.calibrate().await;
        }

        loop {
            if self.config.calibration == CalibrationPolicy::EveryTurn {
                self.calibrate().await;
            }

            self.set_state(LoopState::Listening);
            match self.recognizer.listen(&self.config.params).await {
                Ok(transcript) => {
                    if self.handle_transcript(transcript) {
                        break;
                    }
                }
                Err(RecognitionError::TimedOut) => {
                    tracing::debug!("listen timed out, retrying");
                }
                Err(RecognitionError::Unrecognized) => {
                    tracing::info!("could not understand audio");
                }
                Err(RecognitionError::ServiceUnavailable(detail)) => {
                    tracing::warn!(%detail, "speech recognition unavailable");
                }
            }
            self.set_state(LoopState::Idle);
        }

        self.shutdown().await;
    }

    /// React to one transcript. Returns `true` when the loop should end.
    fn handle_transcript(&mut self, transcript: String) -> bool {
        let trimmed = transcript.trim();

        if trimmed.is_empty() {
            // An empty transcript is never submitted.
            tracing::debug!("empty transcript, ignoring");
            return false;
        }

        if trimmed.eq_ignore_ascii_case(&self.config.exit_phrase) {
            tracing::info!("exit phrase heard");
            return true;
        }

        tracing::info!(transcript = %trimmed, "you said");
        self.pool.submit(trimmed.to_owned());
        false
    }

    async fn calibrate(&self) {
        if let Err(e) = self.recognizer.calibrate().await {
            tracing::warn!(error = %e, "ambient calibration failed, keeping current threshold");
        }
    }

    /// Orderly shutdown: stop intake, drain in-flight workers (bounded),
    /// then send the sentinel so the playback queue finishes what it has
    /// and stops. Replies already in flight are heard before the queue
    /// terminates; workers are never killed mid-synthesis.
    async fn shutdown(mut self) {
        self.set_state(LoopState::ShuttingDown);

        self.pool.drain(self.config.drain_timeout).await;
        self.playback.shutdown();

        tracing::info!("conversation ended");
    }

    fn set_state(&mut self, new_state: LoopState) {
        if self.state != new_state {
            tracing::debug!(old = ?self.state, new = ?new_state, "listen loop state");
            self.state = new_state;
        }
    }
}
