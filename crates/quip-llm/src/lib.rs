//! Ollama language-model adapter for quip.
//!
//! Implements the [`LanguageModel`](quip_core::ports::LanguageModel) port
//! against a local Ollama server's non-streaming `/api/generate` endpoint.

mod client;

pub use client::{OllamaClient, OllamaConfig};
