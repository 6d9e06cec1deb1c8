//! Reply generation stage.
//!
//! Turns one transcript into one reply via the [`LanguageModel`] port.
//! Fails soft: a transport or service hiccup logs and yields `None` so a
//! single language-model failure never crashes the pipeline or a worker.

use std::sync::Arc;

use quip_core::domain::SamplingOptions;
use quip_core::ports::LanguageModel;

/// Builds prompts and calls the language model.
#[derive(Clone)]
pub struct GenerationStage {
    llm: Arc<dyn LanguageModel>,
    persona: String,
    options: SamplingOptions,
}

impl GenerationStage {
    /// Create a stage over a language-model port.
    ///
    /// `persona` is the preamble prepended to every prompt; empty disables
    /// it. `options` are resolved against the hardcoded defaults.
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, persona: String, mut options: SamplingOptions) -> Self {
        options.merge_with(&SamplingOptions::with_hardcoded_defaults());
        Self {
            llm,
            persona,
            options,
        }
    }

    /// Produce a reply for `utterance`, or `None` when the turn should be
    /// dropped (model failure or empty reply).
    pub async fn respond(&self, utterance: &str) -> Option<String> {
        let prompt = build_prompt(&self.persona, utterance);

        match self.llm.generate(&prompt, &self.options).await {
            Ok(reply) => {
                let reply = reply.trim().to_owned();
                if reply.is_empty() {
                    tracing::debug!("language model returned an empty reply, dropping turn");
                    None
                } else {
                    Some(reply)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "language model call failed, dropping turn");
                None
            }
        }
    }
}

/// Frame the utterance with the persona preamble.
fn build_prompt(persona: &str, utterance: &str) -> String {
    if persona.is_empty() {
        utterance.to_owned()
    } else {
        format!("{persona}\nUser: {utterance}\nAssistant:")
    }
}
