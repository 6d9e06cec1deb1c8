//! Port definitions — trait seams for the external collaborators.
//!
//! The pipeline depends on these traits only; concrete adapters live in
//! `quip-llm` (language model) and `quip-voice` (microphone recognizer,
//! speech backends). Tests inject instrumented fakes.

mod language_model;
mod recognizer;

pub use language_model::{GenerationError, LanguageModel};
pub use recognizer::{ListenParams, RecognitionError, SpeechRecognizer};
