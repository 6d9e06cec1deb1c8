//! Response worker pool.
//!
//! A fixed number of long-lived workers each turn one transcript into one
//! playback enqueue, end to end: generate → synthesize → enqueue. The
//! pool's internal queue is unbounded, so submitting never blocks the
//! listen loop beyond an O(1) channel send — this is what lets the next
//! listening cycle start before the current reply has finished playing.
//!
//! Workers may finish out of submission order when latency varies;
//! replies are heard in enqueue-completion order, which privileges
//! throughput over strict turn-ordering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};

use crate::generation::GenerationStage;
use crate::playback::{QueueItem, QueueSender};
use crate::synth::SynthesisStage;

/// Fixed-size pool of response workers.
pub struct ResponseWorkerPool {
    tx: Option<mpsc::UnboundedSender<String>>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl ResponseWorkerPool {
    /// Spawn `size` workers (at least one) sharing one work queue.
    #[must_use]
    pub fn spawn(
        size: usize,
        generation: GenerationStage,
        synthesis: SynthesisStage,
        playback: QueueSender,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx = Arc::new(Mutex::new(rx));

        let size = size.max(1);
        let workers = (0..size)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let generation = generation.clone();
                let synthesis = synthesis.clone();
                let playback = playback.clone();
                tokio::spawn(worker_loop(id, rx, generation, synthesis, playback))
            })
            .collect();

        tracing::debug!(size, "response worker pool started");

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Hand an utterance to the next available worker.
    ///
    /// Never drops while the pool is open: if all workers are busy the
    /// utterance queues for the next one to free up.
    pub fn submit(&self, utterance: String) {
        match &self.tx {
            Some(tx) => {
                if tx.send(utterance).is_err() {
                    tracing::warn!("worker pool queue is gone; dropping utterance");
                }
            }
            None => tracing::warn!("worker pool is closed; dropping utterance"),
        }
    }

    /// Stop accepting submissions. Queued and in-flight turns still run.
    pub fn close(&mut self) {
        self.tx.take();
    }

    /// Wait for in-flight workers to finish, bounded by `timeout`.
    ///
    /// Closes intake first. Workers are never aborted mid-turn — a worker
    /// that outlives the bound keeps running detached and is merely
    /// reported, so partially produced audio is never corrupted.
    pub async fn drain(&mut self, timeout: Duration) {
        self.close();

        let deadline = Instant::now() + timeout;
        let mut unfinished = 0usize;

        for worker in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, worker).await {
                Ok(_) => {}
                Err(_) => unfinished += 1,
            }
        }

        if unfinished > 0 {
            tracing::warn!(unfinished, "drain timeout: workers still busy at shutdown");
        } else {
            tracing::debug!("worker pool drained");
        }
    }
}

/// One worker: take an utterance, generate, synthesize, enqueue.
async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    generation: GenerationStage,
    synthesis: SynthesisStage,
    playback: QueueSender,
) {
    loop {
        // Lock only to wait for the next item; released before processing
        // so the other workers can pick up further utterances meanwhile.
        let utterance = { rx.lock().await.recv().await };
        let Some(utterance) = utterance else { break };

        tracing::debug!(worker = id, transcript = %utterance, "worker took utterance");

        let Some(reply) = generation.respond(&utterance).await else {
            // Turn dropped (generation failed or came back empty): no
            // audio, no crash.
            continue;
        };

        tracing::info!(worker = id, reply = %reply, "assistant reply");

        match synthesis.synthesize(&reply).await {
            Ok(buffer) => playback.enqueue(QueueItem::Buffer(buffer)),
            Err(e) => {
                tracing::warn!(
                    worker = id,
                    error = %e,
                    reply = %reply,
                    "synthesis failed, no audio for this turn"
                );
            }
        }
    }

    tracing::debug!(worker = id, "response worker exiting");
}
