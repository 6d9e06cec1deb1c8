//! Voice pipeline for quip.
//!
//! The pipeline overlaps listening, language-model inference, speech
//! synthesis, and playback without ever corrupting output ordering or
//! racing on the audio device:
//!
//! ```text
//!   microphone → ListenLoop → ResponseWorkerPool → GenerationStage
//!                                    │
//!                                    └→ SynthesisStage → PlaybackQueue → speaker
//! ```
//!
//! The listen loop submits each transcript and immediately listens again;
//! a fixed pool of workers runs generate + synthesize per turn; a single
//! dedicated playback worker drains the queue strictly in order.

pub mod backend;
pub mod error;
pub mod generation;
pub mod listen;
pub mod mic;
pub mod pipeline;
pub mod playback;
pub mod pool;
pub mod synth;
pub mod wav;

// Re-export key types for convenience
pub use error::{AudioError, SynthesisError};
pub use listen::ListenLoop;
pub use pipeline::{Conversation, ConversationConfig};
pub use playback::{AudioSink, PlaybackQueue, QueueItem};
pub use synth::{SharedModel, SharedModelHandle, SynthesisStage};
