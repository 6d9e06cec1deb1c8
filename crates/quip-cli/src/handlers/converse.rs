//! `quip converse` — the full voice loop.

use anyhow::{Context, Result};

use quip_core::settings::Settings;
use quip_voice::playback::RodioSink;
use quip_voice::{Conversation, SynthesisStage};

use crate::bootstrap;

/// Run the voice conversation until the exit phrase is heard.
pub async fn execute(
    settings: &Settings,
    workers: Option<usize>,
    exit_phrase: Option<String>,
) -> Result<()> {
    let model = bootstrap::init_synthesis(settings)?;

    // Warm the model before opening the microphone so the first reply is
    // not delayed by cold weights.
    bootstrap::warm_up(&SynthesisStage::new(std::sync::Arc::clone(&model))).await?;

    let recognizer = bootstrap::init_recognizer(settings)?;
    let llm = bootstrap::init_llm(settings)?;

    let mut config = bootstrap::conversation_config(settings);
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(exit_phrase) = exit_phrase {
        config.exit_phrase = exit_phrase;
    }

    println!(
        "Ready to chat! Say \"{}\" to quit.",
        config.exit_phrase
    );

    let conversation = Conversation::new(llm, model, recognizer, RodioSink::factory(), config)
        .context("failed to start audio playback")?;

    conversation.run().await;
    Ok(())
}
