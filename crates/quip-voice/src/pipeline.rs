//! Conversation pipeline — wires the stages together.
//!
//! Construction order mirrors the data flow in reverse: the playback
//! queue spawns first (its worker must exist before anyone enqueues),
//! then the synthesis and generation stages, then the worker pool, and
//! finally the listen loop that drives everything.

use std::sync::Arc;
use std::time::Duration;

use quip_core::domain::SamplingOptions;
use quip_core::ports::{LanguageModel, ListenParams, SpeechRecognizer};
use quip_core::settings::CalibrationPolicy;

use crate::error::AudioError;
use crate::generation::GenerationStage;
use crate::listen::{ListenLoop, ListenLoopConfig};
use crate::playback::{AudioSink, PlaybackQueue};
use crate::pool::ResponseWorkerPool;
use crate::synth::{SharedModelHandle, SynthesisStage};

/// Tunables for a conversation.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Persona preamble for the generation stage. Empty disables it.
    pub persona: String,

    /// Sampling options for the language model.
    pub options: SamplingOptions,

    /// Number of response workers.
    pub workers: usize,

    /// Utterance that ends the conversation (case-insensitive).
    pub exit_phrase: String,

    /// Listening parameters.
    pub listen: ListenParams,

    /// When ambient-noise calibration runs.
    pub calibration: CalibrationPolicy,

    /// Bound on waiting for in-flight workers at shutdown.
    pub drain_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            persona: String::new(),
            options: SamplingOptions::default(),
            workers: 2,
            exit_phrase: "exit".to_owned(),
            listen: ListenParams::default(),
            calibration: CalibrationPolicy::default(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// A fully wired conversation, ready to run.
pub struct Conversation {
    listener: ListenLoop,
}

impl Conversation {
    /// Wire the pipeline.
    ///
    /// `make_sink` constructs the audio output device on the playback
    /// worker thread; `model` is the exclusively-locked synthesis model
    /// handle shared by all workers.
    pub fn new<F>(
        llm: Arc<dyn LanguageModel>,
        model: SharedModelHandle,
        recognizer: Arc<dyn SpeechRecognizer>,
        make_sink: F,
        config: ConversationConfig,
    ) -> Result<Self, AudioError>
    where
        F: FnOnce() -> Result<Box<dyn AudioSink>, AudioError> + Send + 'static,
    {
        let playback = PlaybackQueue::spawn(make_sink)?;

        let synthesis = SynthesisStage::new(model);
        let generation = GenerationStage::new(llm, config.persona.clone(), config.options.clone());

        let pool = ResponseWorkerPool::spawn(config.workers, generation, synthesis, playback.sender());

        let listener = ListenLoop::new(
            recognizer,
            pool,
            playback,
            ListenLoopConfig {
                exit_phrase: config.exit_phrase,
                params: config.listen,
                calibration: config.calibration,
                drain_timeout: config.drain_timeout,
            },
        );

        Ok(Self { listener })
    }

    /// Run the conversation to completion (until the exit phrase).
    pub async fn run(self) {
        self.listener.run().await;
    }
}
