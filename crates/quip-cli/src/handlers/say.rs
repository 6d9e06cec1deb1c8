//! `quip say` — synthesize text and play it.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use quip_core::settings::Settings;
use quip_voice::playback::{PlaybackQueue, QueueItem, RodioSink};
use quip_voice::SynthesisStage;

use crate::bootstrap;

/// Speak the given text, or each stdin line when no text is given.
pub async fn execute(settings: &Settings, text: Option<String>) -> Result<()> {
    let model = bootstrap::init_synthesis(settings)?;
    let synthesis = SynthesisStage::new(model);

    let playback =
        PlaybackQueue::spawn(RodioSink::factory()).context("failed to start audio playback")?;

    if let Some(text) = text {
        speak(&synthesis, &playback, &text).await?;
    } else {
        let stdin = io::stdin();
        loop {
            print!("Enter text: ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case(&settings.exit_phrase) {
                break;
            }

            speak(&synthesis, &playback, line).await?;
        }
    }

    playback.shutdown();
    Ok(())
}

async fn speak(
    synthesis: &SynthesisStage,
    playback: &PlaybackQueue,
    text: &str,
) -> Result<()> {
    let buffer = synthesis
        .synthesize(text)
        .await
        .context("synthesis failed")?;
    playback.enqueue(QueueItem::Buffer(buffer));
    Ok(())
}
