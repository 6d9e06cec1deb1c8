//! `quip repl` — text in, spoken replies out.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use quip_core::domain::SamplingOptions;
use quip_core::settings::Settings;
use quip_voice::generation::GenerationStage;
use quip_voice::playback::{PlaybackQueue, QueueItem, RodioSink};
use quip_voice::SynthesisStage;

use crate::bootstrap;

/// Read prompts from stdin, print and speak the replies.
pub async fn execute(settings: &Settings) -> Result<()> {
    let model = bootstrap::init_synthesis(settings)?;
    let synthesis = SynthesisStage::new(model);
    let llm = bootstrap::init_llm(settings)?;
    let generation = GenerationStage::new(llm, settings.persona.clone(), SamplingOptions::default());

    let playback =
        PlaybackQueue::spawn(RodioSink::factory()).context("failed to start audio playback")?;

    println!(
        "Ready to chat! (type '{}' to quit)",
        settings.exit_phrase
    );

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let prompt = line.trim();

        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case(&settings.exit_phrase) {
            println!("Exiting...");
            break;
        }

        let Some(reply) = generation.respond(prompt).await else {
            continue;
        };
        println!("Assistant: {reply}");

        match synthesis.synthesize(&reply).await {
            Ok(buffer) => playback.enqueue(QueueItem::Buffer(buffer)),
            Err(e) => tracing::warn!(error = %e, "synthesis failed, reply not spoken"),
        }
    }

    playback.shutdown();
    Ok(())
}
