//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together:
//! settings resolution, synthesis/recognition model loading, and the
//! language-model client. Handlers receive what they need and delegate
//! to the pipeline crates.
//!
//! Model-load failures are fatal here by design — there is no degraded
//! mode without synthesis — and surface as an anyhow context chain with
//! the offending path.

use std::sync::Arc;

use anyhow::{Context, Result};

use quip_core::ports::SpeechRecognizer;
use quip_core::settings::Settings;
use quip_llm::{OllamaClient, OllamaConfig};
use quip_voice::backend::sherpa_stt::{SherpaSttBackend, SherpaSttConfig};
use quip_voice::backend::sherpa_tts::{SherpaTtsBackend, SherpaTtsConfig};
use quip_voice::mic::{LocalRecognizer, MicConfig};
use quip_voice::synth::{SharedModel, SharedModelHandle};
use quip_voice::{ConversationConfig, SynthesisStage};

use crate::parser::Cli;

/// Warm-up iterations run after the synthesis model loads.
const WARM_UP_ITERATIONS: usize = 4;

/// Resolve settings from the config file and apply global CLI overrides.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load_or_default(cli.config.as_deref()).context("failed to load settings")?;

    if let Some(ref model) = cli.model {
        settings.ollama.model.clone_from(model);
    }

    Ok(settings)
}

/// Load the synthesis model and wrap it in the shared, exclusively-locked
/// handle. Fatal on failure.
pub fn init_synthesis(settings: &Settings) -> Result<SharedModelHandle> {
    let model_dir = settings.tts_model_dir();
    let config = SherpaTtsConfig {
        speaker_id: settings.speaker_id,
        speed: settings.speed,
        device: settings.device,
    };

    let backend = SherpaTtsBackend::load(&model_dir, &config).with_context(|| {
        format!(
            "failed to load the synthesis model from {}",
            model_dir.display()
        )
    })?;

    Ok(SharedModel::into_handle(Box::new(backend), settings.device))
}

/// Prime the synthesis model so the first reply does not pay cold-start.
pub async fn warm_up(synthesis: &SynthesisStage) -> Result<()> {
    synthesis
        .warm_up(WARM_UP_ITERATIONS)
        .await
        .context("synthesis warm-up failed")
}

/// Load the STT model and open the microphone. Fatal on failure.
pub fn init_recognizer(settings: &Settings) -> Result<Arc<dyn SpeechRecognizer>> {
    let model_dir = settings.stt_model_dir();
    let stt = SherpaSttBackend::load(&model_dir, &SherpaSttConfig::default()).with_context(
        || {
            format!(
                "failed to load the recognition model from {}",
                model_dir.display()
            )
        },
    )?;

    let mic = LocalRecognizer::new(
        Box::new(stt),
        MicConfig {
            energy_threshold: settings.energy_threshold,
            pause_threshold: settings.pause_threshold(),
            ..MicConfig::default()
        },
    )
    .context("failed to open the microphone")?;

    Ok(Arc::new(mic))
}

/// Build the Ollama client from settings.
pub fn init_llm(settings: &Settings) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(OllamaConfig::from(&settings.ollama))
        .context("failed to initialize the language-model client")?;
    Ok(Arc::new(client))
}

/// Map settings onto the conversation tunables.
pub fn conversation_config(settings: &Settings) -> ConversationConfig {
    ConversationConfig {
        persona: settings.persona.clone(),
        options: quip_core::domain::SamplingOptions::default(),
        workers: settings.workers,
        exit_phrase: settings.exit_phrase.clone(),
        listen: settings.listen_params(),
        calibration: settings.calibration,
        drain_timeout: settings.drain_timeout(),
    }
}
