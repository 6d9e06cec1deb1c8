//! Microphone recognizer — implements the [`SpeechRecognizer`] port.
//!
//! Capture runs on a dedicated OS thread that owns the `cpal` input
//! stream (`cpal::Stream` is `!Send` on some platforms); the stream
//! callback downmixes to mono and forwards frames over a channel. A
//! listening attempt waits for frame energy to cross the speech
//! threshold, accumulates the utterance until a configured pause (or the
//! phrase time limit), resamples to 16 kHz, and hands the audio to the
//! STT backend.
//!
//! Ambient-noise calibration measures the noise floor and raises the
//! speech threshold accordingly; when it runs is a policy decision made
//! by the listen loop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler as _};

use quip_core::ports::{ListenParams, RecognitionError, SpeechRecognizer};

use crate::backend::{STT_SAMPLE_RATE, SttBackend};
use crate::error::AudioError;

/// Utterance endpointing configuration.
#[derive(Debug, Clone)]
pub struct MicConfig {
    /// RMS energy above which a frame counts as speech (normalized f32
    /// samples). Also the floor that calibration can never go below.
    pub energy_threshold: f32,

    /// Trailing silence that ends an utterance.
    pub pause_threshold: Duration,

    /// How long calibration samples ambient noise.
    pub calibration_duration: Duration,

    /// Multiplier applied to the measured noise floor.
    pub calibration_factor: f32,
}

impl Default for MicConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            pause_threshold: Duration::from_millis(800),
            calibration_duration: Duration::from_millis(500),
            calibration_factor: 1.5,
        }
    }
}

enum CaptureCommand {
    Shutdown,
}

/// Local microphone + STT recognizer.
pub struct LocalRecognizer {
    inner: Arc<RecognizerInner>,
    cmd_tx: mpsc::Sender<CaptureCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

/// State shared with the blocking listen/calibrate calls.
struct RecognizerInner {
    /// Mono f32 frames at the device sample rate.
    frames: Mutex<mpsc::Receiver<Vec<f32>>>,

    /// Native rate of the capture device.
    device_sample_rate: u32,

    /// Current speech threshold (updated by calibration).
    threshold: Mutex<f32>,

    config: MicConfig,

    stt: Mutex<Box<dyn SttBackend>>,
}

impl LocalRecognizer {
    /// Open the default input device and spawn the capture thread.
    pub fn new(stt: Box<dyn SttBackend>, config: MicConfig) -> Result<Self, AudioError> {
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<f32>>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<CaptureCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<u32, AudioError>>();

        let thread = thread::Builder::new()
            .name("quip-capture".into())
            .spawn(move || capture_thread(&frame_tx, &cmd_rx, &init_tx))
            .map_err(|e| AudioError::InputStream(format!("failed to spawn capture thread: {e}")))?;

        let device_sample_rate = init_rx.recv().map_err(|_| AudioError::AudioThreadDied)??;

        Ok(Self {
            inner: Arc::new(RecognizerInner {
                frames: Mutex::new(frame_rx),
                device_sample_rate,
                threshold: Mutex::new(config.energy_threshold),
                config,
                stt: Mutex::new(stt),
            }),
            cmd_tx,
            thread: Some(thread),
        })
    }
}

impl Drop for LocalRecognizer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(CaptureCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl SpeechRecognizer for LocalRecognizer {
    async fn calibrate(&self) -> Result<(), RecognitionError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.calibrate())
            .await
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("join error: {e}")))?
    }

    async fn listen(&self, params: &ListenParams) -> Result<String, RecognitionError> {
        let inner = Arc::clone(&self.inner);
        let params = *params;
        tokio::task::spawn_blocking(move || inner.listen_blocking(&params))
            .await
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("join error: {e}")))?
    }
}

impl RecognizerInner {
    fn calibrate(&self) -> Result<(), RecognitionError> {
        let frames = lock_frames(&self.frames)?;
        drain_stale(&frames);

        let deadline = Instant::now() + self.config.calibration_duration;
        let mut energy_sum = 0.0f64;
        let mut count = 0usize;

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match frames.recv_timeout(remaining) {
                Ok(frame) => {
                    energy_sum += f64::from(rms(&frame));
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(capture_gone()),
            }
        }

        if count == 0 {
            // No frames arrived; keep the configured threshold.
            return Ok(());
        }

        #[allow(clippy::cast_possible_truncation)]
        let noise_floor = (energy_sum / count as f64) as f32;
        let threshold = (noise_floor * self.config.calibration_factor)
            .max(self.config.energy_threshold);

        *self
            .threshold
            .lock()
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("lock poisoned: {e}")))? =
            threshold;

        tracing::debug!(noise_floor, threshold, "ambient noise calibrated");
        Ok(())
    }

    fn listen_blocking(&self, params: &ListenParams) -> Result<String, RecognitionError> {
        let audio = self.record_utterance(params)?;

        let audio = if self.device_sample_rate == STT_SAMPLE_RATE {
            audio
        } else {
            resample(&audio, self.device_sample_rate, STT_SAMPLE_RATE)
                .map_err(|e| RecognitionError::ServiceUnavailable(e.to_string()))?
        };

        let text = self
            .stt
            .lock()
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("lock poisoned: {e}")))?
            .transcribe(&audio)?;

        if text.is_empty() {
            return Err(RecognitionError::Unrecognized);
        }
        Ok(text)
    }

    /// Wait for speech, then accumulate until a pause or the phrase limit.
    ///
    /// Returns mono f32 samples at the device sample rate.
    fn record_utterance(&self, params: &ListenParams) -> Result<Vec<f32>, RecognitionError> {
        let frames = lock_frames(&self.frames)?;
        drain_stale(&frames);

        let threshold = *self
            .threshold
            .lock()
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("lock poisoned: {e}")))?;

        // Phase 1: wait for speech onset, bounded by the listen timeout.
        let onset_deadline = Instant::now() + params.timeout;
        let mut utterance: Vec<f32>;
        loop {
            let remaining = onset_deadline
                .checked_duration_since(Instant::now())
                .ok_or(RecognitionError::TimedOut)?;
            match frames.recv_timeout(remaining) {
                Ok(frame) => {
                    if rms(&frame) >= threshold {
                        utterance = frame;
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Err(RecognitionError::TimedOut),
                Err(RecvTimeoutError::Disconnected) => return Err(capture_gone()),
            }
        }

        // Phase 2: accumulate until enough trailing silence or the limit.
        let phrase_deadline = Instant::now() + params.phrase_time_limit;
        let mut silence = Duration::ZERO;

        while silence < self.config.pause_threshold {
            let Some(remaining) = phrase_deadline.checked_duration_since(Instant::now()) else {
                tracing::debug!("phrase time limit reached");
                break;
            };
            match frames.recv_timeout(remaining.min(self.config.pause_threshold)) {
                Ok(frame) => {
                    if rms(&frame) >= threshold {
                        silence = Duration::ZERO;
                    } else {
                        silence += frame_duration(frame.len(), self.device_sample_rate);
                    }
                    utterance.extend(frame);
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(capture_gone()),
            }
        }

        tracing::debug!(
            samples = utterance.len(),
            device_rate = self.device_sample_rate,
            "utterance captured"
        );
        Ok(utterance)
    }
}

fn lock_frames(
    frames: &Mutex<mpsc::Receiver<Vec<f32>>>,
) -> Result<std::sync::MutexGuard<'_, mpsc::Receiver<Vec<f32>>>, RecognitionError> {
    frames
        .lock()
        .map_err(|e| RecognitionError::ServiceUnavailable(format!("lock poisoned: {e}")))
}

fn capture_gone() -> RecognitionError {
    RecognitionError::ServiceUnavailable("capture thread stopped".to_owned())
}

/// Discard frames that accumulated while nobody was listening.
fn drain_stale(frames: &mpsc::Receiver<Vec<f32>>) {
    while frames.try_recv().is_ok() {}
}

/// RMS energy of one frame of normalized samples.
fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum_sq / frame.len() as f32;
    mean.sqrt()
}

/// Duration of `len` samples at `rate` Hz.
fn frame_duration(len: usize, rate: u32) -> Duration {
    if rate == 0 {
        return Duration::ZERO;
    }
    #[allow(clippy::cast_precision_loss)]
    let seconds = len as f64 / f64::from(rate);
    Duration::from_secs_f64(seconds)
}

// ── Capture thread ─────────────────────────────────────────────────

/// Body of the dedicated capture thread: owns the cpal stream for its
/// entire lifetime.
fn capture_thread(
    frame_tx: &mpsc::Sender<Vec<f32>>,
    cmd_rx: &mpsc::Receiver<CaptureCommand>,
    init_tx: &mpsc::Sender<Result<u32, AudioError>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = init_tx.send(Err(AudioError::NoInputDevice));
        return;
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::InputStream(e.to_string())));
            return;
        }
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    let stream = match build_input_stream(&device, &supported, frame_tx.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = init_tx.send(Err(AudioError::InputStream(e.to_string())));
        return;
    }

    tracing::info!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio capture initialized"
    );

    if init_tx.send(Ok(sample_rate)).is_err() {
        return;
    }

    // Keep the stream alive until told to stop.
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            CaptureCommand::Shutdown => break,
        }
    }

    // `stream` drops here, on the capture thread.
    tracing::debug!("capture thread shutting down");
}

/// Build a cpal input stream that downmixes to mono and forwards frames.
fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    frame_tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, AudioError> {
    let stream_config: StreamConfig = config.clone().into();
    let channels = stream_config.channels;
    let sample_format = config.sample_format();

    let err_fn = |err: cpal::StreamError| {
        tracing::error!(%err, "audio input stream error");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = frame_tx.send(downmix_to_mono(data, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32_768.0).collect();
                let _ = frame_tx.send(downmix_to_mono(&floats, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &stream_config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                #[allow(clippy::cast_precision_loss)]
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 2_147_483_648.0).collect();
                let _ = frame_tx.send(downmix_to_mono(&floats, channels));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::InputStream(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };

    stream.map_err(|e| AudioError::InputStream(e.to_string()))
}

/// Average interleaved channels into mono.
fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = usize::from(channels);
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Resample mono audio between rates with FFT-based resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        chunk_size,
        2, // sub-chunks for quality
        1, // mono
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut output = Vec::new();

    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = &samples[pos..pos + chunk_size];
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_size;
    }

    // Pad the tail chunk with zeros and keep only the proportional output.
    if pos < samples.len() {
        let remaining = &samples[pos..];
        let mut padded = vec![0.0f32; chunk_size];
        padded[..remaining.len()].copy_from_slice(remaining);

        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if let Some(channel) = result.first() {
            #[allow(clippy::cast_precision_loss)]
            #[allow(clippy::cast_possible_truncation)]
            #[allow(clippy::cast_sign_loss)]
            let output_len =
                (remaining.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
            let take = output_len.min(channel.len());
            output.extend_from_slice(&channel[..take]);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapStt {
        reply: String,
    }

    impl SttBackend for MapStt {
        fn transcribe(&mut self, _audio: &[f32]) -> Result<String, RecognitionError> {
            Ok(self.reply.clone())
        }
    }

    fn inner_with(
        reply: &str,
        config: MicConfig,
    ) -> (Arc<RecognizerInner>, mpsc::Sender<Vec<f32>>) {
        let (frame_tx, frame_rx) = mpsc::channel();
        let threshold = config.energy_threshold;
        let inner = Arc::new(RecognizerInner {
            frames: Mutex::new(frame_rx),
            device_sample_rate: STT_SAMPLE_RATE,
            threshold: Mutex::new(threshold),
            config,
            stt: Mutex::new(Box::new(MapStt {
                reply: reply.to_owned(),
            })),
        });
        (inner, frame_tx)
    }

    fn speech_frame() -> Vec<f32> {
        vec![0.2; 1600]
    }

    fn silence_frame() -> Vec<f32> {
        vec![0.0; 1600]
    }

    fn short_params() -> ListenParams {
        ListenParams {
            timeout: Duration::from_millis(300),
            phrase_time_limit: Duration::from_secs(2),
        }
    }

    #[test]
    fn times_out_without_speech() {
        let (inner, frame_tx) = inner_with("hello", MicConfig::default());
        // Only silence arrives.
        for _ in 0..3 {
            frame_tx.send(silence_frame()).unwrap();
        }
        let err = inner.listen_blocking(&short_params()).unwrap_err();
        assert!(matches!(err, RecognitionError::TimedOut));
    }

    #[test]
    fn transcribes_after_pause() {
        let config = MicConfig {
            pause_threshold: Duration::from_millis(100),
            ..MicConfig::default()
        };
        let (inner, frame_tx) = inner_with("hello world", config);

        // Speech followed by enough silence to endpoint the utterance.
        frame_tx.send(speech_frame()).unwrap();
        frame_tx.send(speech_frame()).unwrap();
        for _ in 0..4 {
            frame_tx.send(silence_frame()).unwrap();
        }

        let text = inner.listen_blocking(&short_params()).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn empty_transcription_is_unrecognized() {
        let config = MicConfig {
            pause_threshold: Duration::from_millis(100),
            ..MicConfig::default()
        };
        let (inner, frame_tx) = inner_with("", config);

        frame_tx.send(speech_frame()).unwrap();
        for _ in 0..4 {
            frame_tx.send(silence_frame()).unwrap();
        }

        let err = inner.listen_blocking(&short_params()).unwrap_err();
        assert!(matches!(err, RecognitionError::Unrecognized));
    }

    #[test]
    fn dead_capture_thread_is_service_unavailable() {
        let (inner, frame_tx) = inner_with("hello", MicConfig::default());
        drop(frame_tx);
        let err = inner.listen_blocking(&short_params()).unwrap_err();
        assert!(matches!(err, RecognitionError::ServiceUnavailable(_)));
    }

    #[test]
    fn calibration_raises_threshold_above_noise() {
        let config = MicConfig {
            calibration_duration: Duration::from_millis(50),
            ..MicConfig::default()
        };
        let (inner, frame_tx) = inner_with("hello", config);

        // Loud ambient noise.
        for _ in 0..5 {
            frame_tx.send(vec![0.1; 1600]).unwrap();
        }

        inner.calibrate().unwrap();
        let threshold = *inner.threshold.lock().unwrap();
        assert!(threshold > 0.1, "threshold {threshold} should exceed noise");
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn resample_halves_sample_count() {
        let input: Vec<f32> = (0..3200)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / 32_000.0;
                (t * 440.0 * std::f32::consts::TAU).sin()
            })
            .collect();

        let output = resample(&input, 32_000, 16_000).unwrap();
        let expected = input.len() / 2;
        let tolerance = expected / 10;
        assert!(
            output.len().abs_diff(expected) <= tolerance,
            "resampled to {} samples, expected about {expected}",
            output.len()
        );
    }
}
