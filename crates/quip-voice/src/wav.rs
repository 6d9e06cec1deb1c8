//! WAV export — write a synthesized buffer to disk and return a base64
//! blob of the file contents.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use quip_core::domain::AudioBuffer;

use crate::error::WavError;

/// Longest file-name stem derived from the synthesized text.
const MAX_STEM_LEN: usize = 50;

/// Derive a safe file-name stem from synthesized text.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`; the result is
/// capped at 50 characters.
#[must_use]
pub fn sanitize_filename(text: &str) -> String {
    text.chars()
        .take(MAX_STEM_LEN)
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Write a buffer as a 16-bit mono WAV file.
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<(), WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::debug!(path = %path.display(), samples = buffer.len(), "WAV written");
    Ok(())
}

/// Write the buffer as `<sanitized-text>.wav` under `dir` and return the
/// path together with the base64 encoding of the file bytes.
pub fn export_base64(
    buffer: &AudioBuffer,
    dir: &Path,
    text: &str,
) -> Result<(PathBuf, String), WavError> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!("{}.wav", sanitize_filename(text)));
    write_wav(buffer, &path)?;

    let bytes = std::fs::read(&path)?;
    Ok((path, BASE64.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_and_caps() {
        assert_eq!(sanitize_filename("hello world!"), "hello_world_");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");

        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long).len(), MAX_STEM_LEN);
    }

    #[test]
    fn wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let buffer = AudioBuffer::new(vec![0, 100, -100, i16::MAX, i16::MIN], 22_050);

        write_wav(&buffer, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, buffer.samples);
    }

    #[test]
    fn export_names_file_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = AudioBuffer::new(vec![1, 2, 3], 22_050);

        let (path, blob) = export_base64(&buffer, dir.path(), "hello there!").unwrap();

        assert!(path.ends_with("hello_there_.wav"));
        assert!(!blob.is_empty());

        let decoded = BASE64.decode(blob).unwrap();
        assert_eq!(decoded, std::fs::read(&path).unwrap());
    }
}
