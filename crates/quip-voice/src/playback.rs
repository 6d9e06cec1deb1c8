//! Playback queue — ordered, non-overlapping audio output.
//!
//! A single dedicated OS thread owns the audio output device and drains an
//! unbounded FIFO of decoded buffers, playing each one to completion
//! before fetching the next. This is what guarantees replies are heard as
//! discrete, non-overlapping utterances regardless of how many workers
//! finish synthesis at once.
//!
//! The output device sits behind the [`AudioSink`] trait. `rodio`'s
//! `OutputStream` is `!Send` on some platforms, so the production sink is
//! constructed *on* the playback thread via a factory closure and never
//! crosses a thread boundary (the same confinement discipline as the rest
//! of the audio I/O).

use std::sync::mpsc;
use std::thread;

use quip_core::domain::AudioBuffer;

use crate::error::AudioError;

/// An item travelling through the playback queue.
#[derive(Debug)]
pub enum QueueItem {
    /// A fully synthesized reply, ready to play.
    Buffer(AudioBuffer),

    /// Orderly-shutdown sentinel: the worker stops after observing it,
    /// fetching no further items.
    Shutdown,
}

/// Abstraction over the audio output device.
///
/// `play` blocks until the device has consumed the whole buffer.
pub trait AudioSink {
    /// Play one buffer to completion.
    fn play(&mut self, buffer: &AudioBuffer) -> Result<(), AudioError>;
}

/// Cloneable producer half of the playback queue.
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<QueueItem>,
}

impl QueueSender {
    /// Enqueue an item. Non-blocking; the queue is unbounded.
    pub fn enqueue(&self, item: QueueItem) {
        if self.tx.send(item).is_err() {
            tracing::warn!("playback worker is gone; dropping queue item");
        }
    }
}

/// Handle to the playback queue and its dedicated worker thread.
pub struct PlaybackQueue {
    tx: mpsc::Sender<QueueItem>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PlaybackQueue {
    /// Spawn the playback worker.
    ///
    /// `make_sink` runs on the worker thread to construct the (possibly
    /// `!Send`) output device; a construction failure is propagated back
    /// to the caller through an init handshake.
    pub fn spawn<F>(make_sink: F) -> Result<Self, AudioError>
    where
        F: FnOnce() -> Result<Box<dyn AudioSink>, AudioError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<QueueItem>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name("quip-playback".into())
            .spawn(move || Self::run(make_sink, &rx, &init_tx))
            .map_err(|e| {
                AudioError::OutputStream(format!("failed to spawn playback thread: {e}"))
            })?;

        // Wait for the worker to finish initializing its sink.
        init_rx.recv().map_err(|_| AudioError::AudioThreadDied)??;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// A cloneable producer handle for the worker pool.
    #[must_use]
    pub fn sender(&self) -> QueueSender {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue an item. Non-blocking; the queue is unbounded.
    pub fn enqueue(&self, item: QueueItem) {
        if self.tx.send(item).is_err() {
            tracing::warn!("playback worker is gone; dropping queue item");
        }
    }

    /// Send the shutdown sentinel and wait for the worker to drain and exit.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(QueueItem::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// The worker body: initialize the sink, then drain the queue.
    fn run<F>(make_sink: F, rx: &mpsc::Receiver<QueueItem>, init_tx: &mpsc::Sender<Result<(), AudioError>>)
    where
        F: FnOnce() -> Result<Box<dyn AudioSink>, AudioError>,
    {
        let mut sink = match make_sink() {
            Ok(sink) => {
                if init_tx.send(Ok(())).is_err() {
                    // Caller dropped before init completed.
                    return;
                }
                sink
            }
            Err(e) => {
                let _ = init_tx.send(Err(e));
                return;
            }
        };

        while let Ok(item) = rx.recv() {
            match item {
                QueueItem::Buffer(buffer) => {
                    tracing::debug!(
                        samples = buffer.len(),
                        duration_ms = buffer.duration().as_millis(),
                        "playing buffer"
                    );
                    if let Err(e) = sink.play(&buffer) {
                        // A device hiccup must not kill the queue.
                        tracing::error!(error = %e, "audio playback failed");
                    }
                }
                QueueItem::Shutdown => break,
            }
        }

        tracing::debug!("playback worker shutting down");
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        // Best-effort shutdown — the worker may already be gone.
        let _ = self.tx.send(QueueItem::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Production sink ────────────────────────────────────────────────

/// Audio output via `rodio`, owned exclusively by the playback thread.
pub struct RodioSink {
    /// rodio output stream (must be kept alive).
    _stream: rodio::OutputStream,

    /// Handle used to create per-buffer sinks.
    handle: rodio::OutputStreamHandle,
}

impl RodioSink {
    /// Open the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| AudioError::OutputStream(e.to_string()))?;

        tracing::info!("audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Factory for [`PlaybackQueue::spawn`]; runs on the playback thread.
    pub fn factory() -> impl FnOnce() -> Result<Box<dyn AudioSink>, AudioError> + Send + 'static {
        || RodioSink::new().map(|sink| Box::new(sink) as Box<dyn AudioSink>)
    }
}

impl AudioSink for RodioSink {
    fn play(&mut self, buffer: &AudioBuffer) -> Result<(), AudioError> {
        let sink = rodio::Sink::try_new(&self.handle)
            .map_err(|e| AudioError::OutputStream(e.to_string()))?;

        let source =
            rodio::buffer::SamplesBuffer::new(1, buffer.sample_rate, buffer.samples.clone());
        sink.append(source);

        // Blocks until the device has consumed the buffer.
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct RecordingSink {
        played: Arc<Mutex<Vec<AudioBuffer>>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self, buffer: &AudioBuffer) -> Result<(), AudioError> {
            self.played.lock().unwrap().push(buffer.clone());
            Ok(())
        }
    }

    fn recording_queue() -> (PlaybackQueue, Arc<Mutex<Vec<AudioBuffer>>>) {
        let played = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&played);
        let queue = PlaybackQueue::spawn(move || {
            Ok(Box::new(RecordingSink { played: sink_log }) as Box<dyn AudioSink>)
        })
        .unwrap();
        (queue, played)
    }

    fn buffer(marker: i16) -> AudioBuffer {
        AudioBuffer::new(vec![marker; 4], 22_050)
    }

    #[test]
    fn drains_in_fifo_order() {
        let (queue, played) = recording_queue();

        for marker in 0..8 {
            queue.enqueue(QueueItem::Buffer(buffer(marker)));
        }
        queue.shutdown();

        let played = played.lock().unwrap();
        let markers: Vec<i16> = played.iter().map(|b| b.samples[0]).collect();
        assert_eq!(markers, (0..8).collect::<Vec<i16>>());
    }

    #[test]
    fn sentinel_stops_further_fetches() {
        let (queue, played) = recording_queue();

        queue.enqueue(QueueItem::Buffer(buffer(1)));
        queue.enqueue(QueueItem::Shutdown);
        queue.enqueue(QueueItem::Buffer(buffer(2)));
        queue.shutdown();

        let played = played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].samples[0], 1);
    }

    #[test]
    fn sink_init_failure_propagates() {
        let result = PlaybackQueue::spawn(|| Err(AudioError::NoOutputDevice));
        assert!(matches!(result, Err(AudioError::NoOutputDevice)));
    }

    #[test]
    fn sink_play_error_does_not_kill_the_worker() {
        struct FlakySink {
            played: Arc<Mutex<Vec<AudioBuffer>>>,
            failed_once: bool,
        }

        impl AudioSink for FlakySink {
            fn play(&mut self, buffer: &AudioBuffer) -> Result<(), AudioError> {
                if self.failed_once {
                    self.played.lock().unwrap().push(buffer.clone());
                    Ok(())
                } else {
                    self.failed_once = true;
                    Err(AudioError::OutputStream("glitch".to_owned()))
                }
            }
        }

        let played = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&played);
        let queue = PlaybackQueue::spawn(move || {
            Ok(Box::new(FlakySink {
                played: sink_log,
                failed_once: false,
            }) as Box<dyn AudioSink>)
        })
        .unwrap();

        queue.enqueue(QueueItem::Buffer(buffer(1)));
        queue.enqueue(QueueItem::Buffer(buffer(2)));
        queue.shutdown();

        let played = played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].samples[0], 2);
    }
}
