//! Core domain types and port definitions for quip.
//!
//! This crate is dependency-light on purpose: it defines the data model
//! (audio buffers, sampling options), the collaborator ports (speech
//! recognition, language model), and the application settings. Adapter
//! crates (`quip-llm`, `quip-voice`) implement the ports; the CLI wires
//! everything together at its composition root.

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export key types for convenience
pub use domain::{AudioBuffer, SamplingOptions};
pub use ports::{
    GenerationError, LanguageModel, ListenParams, RecognitionError, SpeechRecognizer,
};
pub use settings::{CalibrationPolicy, ComputeDevice, Settings};
