//! Speaker output via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so it lives on a
//! dedicated OS thread for the lifetime of [`RodioOutput`]. Only the
//! `Send + Sync` stream handle crosses back to the async side, where each
//! [`AudioOutput::play`] call creates its own `Sink`.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use async_trait::async_trait;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use voxagent_core::{AudioOutput, PlaybackError, SynthesizedAudio};

use crate::error::VoiceError;

/// [`AudioOutput`] on the default output device.
pub struct RodioOutput {
    stream_handle: OutputStreamHandle,

    /// Sink of the clip currently playing, if any.
    current: Mutex<Option<Arc<Sink>>>,

    shutdown_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioOutput {
    /// Open the default output device on a dedicated audio thread.
    pub fn open() -> Result<Self, VoiceError> {
        let (init_tx, init_rx) = mpsc::channel::<Result<OutputStreamHandle, VoiceError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("voxagent-audio-out".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(VoiceError::OutputStreamError(e.to_string())));
                        return;
                    }
                };
                if init_tx.send(Ok(handle)).is_err() {
                    return;
                }

                // Hold the stream open until shutdown (or the handle is dropped).
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("Audio output thread shutting down");
            })
            .map_err(|e| {
                VoiceError::OutputStreamError(format!("failed to spawn audio thread: {e}"))
            })?;

        let stream_handle = init_rx.recv().map_err(|_| VoiceError::AudioThreadDied)??;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            stream_handle,
            current: Mutex::new(None),
            shutdown_tx,
            thread: Some(thread),
        })
    }

    fn set_current(&self, sink: Option<Arc<Sink>>) -> Option<Arc<Sink>> {
        match self.current.lock() {
            Ok(mut current) => std::mem::replace(&mut *current, sink),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), sink),
        }
    }

    /// Clear `current` only if it still refers to `sink`.
    fn clear_if_current(&self, sink: &Arc<Sink>) {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, sink)) {
            *current = None;
        }
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    async fn play(&self, audio: SynthesizedAudio) -> Result<(), PlaybackError> {
        if audio.is_empty() {
            return Ok(());
        }

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| VoiceError::OutputStreamError(e.to_string()))?;
        sink.append(rodio::buffer::SamplesBuffer::new(
            1,
            audio.sample_rate,
            audio.samples,
        ));
        let sink = Arc::new(sink);

        if let Some(previous) = self.set_current(Some(Arc::clone(&sink))) {
            previous.stop();
        }
        tracing::debug!(
            sample_rate = audio.sample_rate,
            duration_ms = audio.duration.as_millis(),
            "Audio playback started"
        );

        // `sleep_until_end` returns early once `stop()` empties the sink.
        let waiter = Arc::clone(&sink);
        let joined = tokio::task::spawn_blocking(move || waiter.sleep_until_end()).await;

        self.clear_if_current(&sink);
        joined.map_err(|e| PlaybackError::Device(format!("playback watcher failed: {e}")))
    }

    fn stop(&self) {
        if let Some(sink) = self.set_current(None) {
            sink.stop();
            tracing::debug!("Audio playback stopped");
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.stop();
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
