//! `quip export` — synthesize to a WAV file and print a base64 blob.

use std::path::Path;

use anyhow::{Context, Result};

use quip_core::settings::Settings;
use quip_voice::wav;
use quip_voice::SynthesisStage;

use crate::bootstrap;

/// Synthesize `text`, write it under `out`, print path and base64 bytes.
pub async fn execute(settings: &Settings, text: &str, out: &Path) -> Result<()> {
    let model = bootstrap::init_synthesis(settings)?;
    let synthesis = SynthesisStage::new(model);

    let buffer = synthesis
        .synthesize(text)
        .await
        .context("synthesis failed")?;

    let (path, blob) =
        wav::export_base64(&buffer, out, text).context("failed to write WAV file")?;

    println!("{}", path.display());
    println!("{blob}");
    Ok(())
}
