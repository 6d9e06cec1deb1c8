//! Sherpa-ONNX Whisper STT backend — implements [`SttBackend`] via `sherpa-rs`.

use std::path::Path;

use sherpa_rs::whisper::{WhisperConfig, WhisperRecognizer};

use crate::backend::{STT_SAMPLE_RATE, SttBackend};
use quip_core::ports::RecognitionError;

/// Configuration for the sherpa Whisper STT backend.
#[derive(Debug, Clone)]
pub struct SherpaSttConfig {
    /// Language code (e.g., `"en"`; `"auto"` enables detection).
    pub language: String,

    /// Number of inference threads.
    pub num_threads: i32,
}

impl Default for SherpaSttConfig {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            num_threads: 4,
        }
    }
}

/// Sherpa-ONNX Whisper STT backend.
pub struct SherpaSttBackend {
    recognizer: WhisperRecognizer,
}

impl SherpaSttBackend {
    /// Load a Whisper model from a directory.
    ///
    /// The directory must contain encoder, decoder, and tokens files in
    /// the sherpa-onnx naming convention (`{prefix}-encoder.onnx`,
    /// `{prefix}-decoder.onnx`, `{prefix}-tokens.txt`). An int8-quantised
    /// decoder (`{prefix}-decoder.int8.onnx`) is preferred when present.
    pub fn load(model_dir: &Path, config: &SherpaSttConfig) -> Result<Self, RecognitionError> {
        if !model_dir.exists() {
            return Err(RecognitionError::ServiceUnavailable(format!(
                "STT model directory not found: {}",
                model_dir.display()
            )));
        }

        let prefix = find_file_prefix(model_dir, "-encoder.onnx")?;

        let encoder_path = model_dir.join(format!("{prefix}-encoder.onnx"));
        let decoder_int8 = model_dir.join(format!("{prefix}-decoder.int8.onnx"));
        let decoder_path = if decoder_int8.exists() {
            decoder_int8
        } else {
            model_dir.join(format!("{prefix}-decoder.onnx"))
        };
        let tokens_path = model_dir.join(format!("{prefix}-tokens.txt"));

        for path in [&encoder_path, &decoder_path, &tokens_path] {
            if !path.exists() {
                return Err(RecognitionError::ServiceUnavailable(format!(
                    "STT model file not found: {}",
                    path.display()
                )));
            }
        }

        tracing::info!(
            dir = %model_dir.display(),
            language = %config.language,
            "loading STT model"
        );

        let language = if config.language == "auto" {
            String::new()
        } else {
            config.language.clone()
        };

        let whisper_config = WhisperConfig {
            encoder: path_to_string(&encoder_path)?,
            decoder: path_to_string(&decoder_path)?,
            tokens: path_to_string(&tokens_path)?,
            language,
            num_threads: Some(config.num_threads),
            ..Default::default()
        };

        let recognizer = WhisperRecognizer::new(whisper_config).map_err(|e| {
            RecognitionError::ServiceUnavailable(format!("failed to load STT model: {e}"))
        })?;

        tracing::info!("STT model loaded");

        Ok(Self { recognizer })
    }
}

impl SttBackend for SherpaSttBackend {
    fn transcribe(&mut self, audio: &[f32]) -> Result<String, RecognitionError> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        let result = self.recognizer.transcribe(STT_SAMPLE_RATE, audio);
        let text = result.text.trim().to_owned();

        tracing::debug!(chars = text.len(), "transcription complete");

        Ok(text)
    }
}

/// Scan `dir` for a file whose name ends with `suffix` and return the prefix.
fn find_file_prefix(dir: &Path, suffix: &str) -> Result<String, RecognitionError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        RecognitionError::ServiceUnavailable(format!(
            "cannot read STT model directory {}: {e}",
            dir.display()
        ))
    })?;

    for entry in entries.flatten() {
        if let Some(name) = entry.file_name().to_str() {
            if let Some(stripped) = name.strip_suffix(suffix) {
                return Ok(stripped.to_owned());
            }
        }
    }

    Err(RecognitionError::ServiceUnavailable(format!(
        "no file matching *{suffix} in {}",
        dir.display()
    )))
}

/// Convert a path to a string, rejecting invalid UTF-8.
fn path_to_string(path: &Path) -> Result<String, RecognitionError> {
    path.to_str().map(ToString::to_string).ok_or_else(|| {
        RecognitionError::ServiceUnavailable(format!("invalid path: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.en-encoder.onnx"), b"stub").unwrap();

        let prefix = find_file_prefix(dir.path(), "-encoder.onnx").unwrap();
        assert_eq!(prefix, "base.en");
    }

    #[test]
    fn missing_encoder_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_file_prefix(dir.path(), "-encoder.onnx").is_err());
    }
}
