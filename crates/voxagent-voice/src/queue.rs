//! Speech playback queue.
//!
//! A strict FIFO of [`SpeechRequest`]s drained by a single background worker:
//!
//! ```text
//!   submit ──▶ [ req 3 | req 2 ] ──▶ worker ──▶ chunk ──▶ synthesize ──▶ play
//!                                      ▲                                  │
//!                                      └──────────── next chunk ──────────┘
//! ```
//!
//! The worker is spawned on demand by [`SpeechQueue::submit`] and exits once
//! the queue is empty. [`SpeechQueue::stop`] cancels the worker, discards
//! everything queued and silences the output device; the next `submit`
//! starts a fresh worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use voxagent_core::{AudioOutput, SpeechRequest, SynthesisError, VoiceSynthesizer};

use crate::text_utils::{self, DEFAULT_MAX_CHUNK_CHARS};

// ── Events emitted by the queue ────────────────────────────────────

/// Progress events for observers of the playback queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The worker picked up a request and split it into `chunks`.
    RequestStarted { id: u64, chunks: usize },

    /// Audio for one chunk started playing.
    ChunkStarted { id: u64, index: usize, text: String },

    /// Audio for one chunk finished playing.
    ChunkFinished { id: u64, index: usize },

    /// Synthesis of one chunk failed; the rest of the request continues.
    ChunkSkipped { id: u64, index: usize, error: String },

    /// Every chunk of the request was handled.
    RequestFinished { id: u64 },

    /// The remainder of the request was abandoned after a failure.
    RequestDropped { id: u64, error: String },

    /// [`SpeechQueue::stop`] flushed the queue.
    Stopped,
}

// ── Queue ──────────────────────────────────────────────────────────

/// The current worker's request channel and cancellation token.
struct Worker {
    tx: mpsc::UnboundedSender<SpeechRequest>,
    cancel: CancellationToken,
    generation: u64,
}

/// Worker bookkeeping, guarded by one lock.
#[derive(Default)]
struct Slot {
    /// The worker accepting submissions, if any.
    worker: Option<Worker>,

    /// Spawned worker tasks that have not returned yet, including stopped
    /// ones still unwinding. The queue is idle only when this is zero.
    live: usize,
}

struct Inner {
    synthesizer: Arc<dyn VoiceSynthesizer>,
    output: Arc<dyn AudioOutput>,
    max_chunk_chars: usize,

    /// Submissions and worker exit are serialized through this lock so no
    /// request is stranded.
    slot: Mutex<Slot>,
    generation: AtomicU64,

    idle: watch::Sender<bool>,
    events: Option<mpsc::UnboundedSender<PlaybackEvent>>,

    /// Held by the worker for the playback of one chunk.
    device: tokio::sync::Mutex<()>,
}

/// Handle to the playback queue. Clones share the same queue.
#[derive(Clone)]
pub struct SpeechQueue {
    inner: Arc<Inner>,
}

impl SpeechQueue {
    /// Create a queue with the default chunk length and no event channel.
    pub fn new(synthesizer: Arc<dyn VoiceSynthesizer>, output: Arc<dyn AudioOutput>) -> Self {
        Self::build(synthesizer, output, DEFAULT_MAX_CHUNK_CHARS, None)
    }

    /// Create a queue that reports progress as [`PlaybackEvent`]s.
    ///
    /// Returns the queue and a receiver for its events.
    pub fn with_events(
        synthesizer: Arc<dyn VoiceSynthesizer>,
        output: Arc<dyn AudioOutput>,
        max_chunk_chars: usize,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self::build(synthesizer, output, max_chunk_chars, Some(tx)),
            rx,
        )
    }

    /// Override the maximum chunk length.
    #[must_use]
    pub fn with_max_chunk_chars(
        synthesizer: Arc<dyn VoiceSynthesizer>,
        output: Arc<dyn AudioOutput>,
        max_chunk_chars: usize,
    ) -> Self {
        Self::build(synthesizer, output, max_chunk_chars, None)
    }

    fn build(
        synthesizer: Arc<dyn VoiceSynthesizer>,
        output: Arc<dyn AudioOutput>,
        max_chunk_chars: usize,
        events: Option<mpsc::UnboundedSender<PlaybackEvent>>,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                synthesizer,
                output,
                max_chunk_chars: max_chunk_chars.max(1),
                slot: Mutex::new(Slot::default()),
                generation: AtomicU64::new(0),
                idle,
                events,
                device: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Enqueue a request and return immediately.
    ///
    /// Starts the worker if it is idle. Must be called within a tokio
    /// runtime.
    pub fn submit(&self, request: SpeechRequest) {
        let mut slot = lock(&self.inner.slot);

        let request = match slot.worker.as_ref() {
            Some(worker) => match worker.tx.send(request) {
                Ok(()) => {
                    tracing::debug!("Speech request queued behind active worker");
                    return;
                }
                // Worker already gone; fall through and start a new one.
                Err(mpsc::error::SendError(request)) => request,
            },
            None => request,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(id = request.id, generation, "Starting playback worker");
        let _ = tx.send(request);
        slot.worker = Some(Worker {
            tx,
            cancel: cancel.clone(),
            generation,
        });
        slot.live += 1;
        self.inner.idle.send_replace(false);
        drop(slot);

        tokio::spawn(run_worker(Arc::clone(&self.inner), rx, cancel, generation));
    }

    /// Halt playback immediately and discard every queued request.
    ///
    /// A later [`submit`](Self::submit) starts a fresh worker right away.
    /// The queue reports idle once the cancelled worker has returned and
    /// released the output device. Calling `stop` on an idle queue is a
    /// no-op.
    pub fn stop(&self) {
        let worker = lock(&self.inner.slot).worker.take();
        let Some(worker) = worker else {
            return;
        };

        worker.cancel.cancel();
        self.inner.output.stop();
        self.inner.emit(PlaybackEvent::Stopped);
        tracing::info!(generation = worker.generation, "Playback stopped, queue flushed");
    }

    /// Whether no worker is running or unwinding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self.inner.idle.borrow()
    }

    /// Resolve once the queue is idle.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = idle.wait_for(|idle| *idle).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Worker ─────────────────────────────────────────────────────────

async fn run_worker(
    inner: Arc<Inner>,
    rx: mpsc::UnboundedReceiver<SpeechRequest>,
    cancel: CancellationToken,
    generation: u64,
) {
    drain_requests(&inner, rx, &cancel, generation).await;
    inner.worker_exited(generation);
}

async fn drain_requests(
    inner: &Inner,
    mut rx: mpsc::UnboundedReceiver<SpeechRequest>,
    cancel: &CancellationToken,
    generation: u64,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let request = match rx.try_recv() {
            Ok(request) => request,
            Err(mpsc::error::TryRecvError::Disconnected) => return,
            Err(mpsc::error::TryRecvError::Empty) => {
                let mut slot = lock(&inner.slot);
                // Re-check under the lock: `submit` sends while holding it.
                if let Ok(request) = rx.try_recv() {
                    request
                } else {
                    if slot.worker.as_ref().is_some_and(|w| w.generation == generation) {
                        slot.worker = None;
                        tracing::debug!(generation, "Playback queue drained");
                    }
                    return;
                }
            }
        };

        inner.speak(request, cancel).await;
    }
}

impl Inner {
    /// Publish idle once no worker accepts submissions and none is still
    /// running.
    fn worker_exited(&self, generation: u64) {
        let mut slot = lock(&self.slot);
        slot.live = slot.live.saturating_sub(1);
        if slot.worker.is_none() && slot.live == 0 {
            self.idle.send_replace(true);
            tracing::debug!(generation, "Playback queue idle");
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Synthesize and play one request, chunk by chunk.
    ///
    /// Returns early without further events once `cancel` fires.
    async fn speak(&self, request: SpeechRequest, cancel: &CancellationToken) {
        let id = request.id;
        let chunks = text_utils::split_for_synthesis(&request.text, self.max_chunk_chars);
        tracing::debug!(id, chunks = chunks.len(), speaker = %request.speaker, "Speaking request");
        self.emit(PlaybackEvent::RequestStarted {
            id,
            chunks: chunks.len(),
        });

        for (index, text) in chunks.into_iter().enumerate() {
            let synthesized = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = self.synthesizer.synthesize(&text, &request.speaker) => result,
            };

            let audio = match synthesized {
                Ok(audio) => audio,
                Err(e @ SynthesisError::MissingVoiceProfile(_)) => {
                    tracing::warn!(id, error = %e, "Dropping speech request");
                    self.emit(PlaybackEvent::RequestDropped {
                        id,
                        error: e.to_string(),
                    });
                    return;
                }
                Err(e) => {
                    tracing::warn!(id, index, error = %e, "Skipping chunk after synthesis failure");
                    self.emit(PlaybackEvent::ChunkSkipped {
                        id,
                        index,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let _device = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                guard = self.device.lock() => guard,
            };

            self.emit(PlaybackEvent::ChunkStarted {
                id,
                index,
                text: text.clone(),
            });

            let played = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.output.stop();
                    return;
                }
                result = self.output.play(audio) => result,
            };

            if let Err(e) = played {
                tracing::warn!(id, error = %e, "Dropping speech request after playback failure");
                self.emit(PlaybackEvent::RequestDropped {
                    id,
                    error: e.to_string(),
                });
                return;
            }
            self.emit(PlaybackEvent::ChunkFinished { id, index });
        }

        self.emit(PlaybackEvent::RequestFinished { id });
    }
}
