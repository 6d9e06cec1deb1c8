//! Voice pipeline error types.

use std::path::PathBuf;

/// Errors from the synthesis stage and its model backend.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// Synthesis was asked for empty (or whitespace-only) text.
    #[error("cannot synthesize empty text")]
    EmptyText,

    /// The model call itself failed.
    #[error("synthesis model error: {0}")]
    Model(String),

    /// A required model file is missing.
    #[error("synthesis model not found at {0}")]
    ModelNotFound(PathBuf),

    /// The model could not be loaded. Fatal at startup: there is no
    /// degraded mode without synthesis.
    #[error("failed to load synthesis model: {0}")]
    ModelLoad(String),
}

/// Errors from the audio devices (capture and playback).
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No audio input device found.
    #[error("no audio input device found")]
    NoInputDevice,

    /// No audio output device found.
    #[error("no audio output device found")]
    NoOutputDevice,

    /// Failed to open or drive the input stream.
    #[error("audio input stream error: {0}")]
    InputStream(String),

    /// Failed to open or drive the output stream.
    #[error("audio output stream error: {0}")]
    OutputStream(String),

    /// Audio resampling failed.
    #[error("audio resampling failed: {0}")]
    Resample(String),

    /// A dedicated audio thread stopped responding.
    #[error("audio thread died")]
    AudioThreadDied,
}

/// Errors from WAV export.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    /// Filesystem failure while writing or reading the file.
    #[error("WAV file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encoding failure.
    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),
}
