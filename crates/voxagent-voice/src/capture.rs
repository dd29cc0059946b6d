//! Microphone capture with energy-based endpointing, via `cpal`.
//!
//! A capture call opens the default input device, optionally measures the
//! ambient noise floor, waits for speech to start, and records until a
//! trailing pause or the phrase limit. The recorded phrase is then sent to a
//! [`Transcriber`].
//!
//! `cpal::Stream` is `!Send`, so the whole recording runs inside
//! `spawn_blocking` and only the finished sample buffer comes back.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use voxagent_core::{CaptureError, CaptureOptions, SpeechRecognizer, SpeechSettings};

use crate::error::VoiceError;
use crate::stt::{Transcriber, encode_wav};

/// Length of one analysis frame.
const FRAME: Duration = Duration::from_millis(30);

/// Ambient noise is multiplied by this to get the dynamic threshold.
const DYNAMIC_THRESHOLD_RATIO: f32 = 1.5;

/// RMS energy of `samples` on the 16-bit integer scale.
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / samples.len() as f32;
    mean.sqrt() * 32768.0
}

/// Speech threshold after calibration against `ambient` energy.
#[must_use]
pub fn calibrated_threshold(base: f32, ambient: f32, dynamic: bool) -> f32 {
    if dynamic {
        base.max(ambient * DYNAMIC_THRESHOLD_RATIO)
    } else {
        base
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Progress of an [`Endpointer`] after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// No speech yet.
    Waiting,
    /// Speech started and the phrase is still open.
    Recording,
    /// The phrase ended on a pause or the phrase limit.
    Complete,
    /// No speech started within the listen timeout.
    TimedOut,
}

/// Timing and threshold parameters for endpointing.
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    pub threshold: f32,
    pub pause: Duration,
    pub timeout: Duration,
    pub phrase_limit: Duration,
}

/// Frame-by-frame speech endpoint detector.
#[derive(Debug)]
pub struct Endpointer {
    threshold: f32,
    pause_samples: usize,
    timeout_samples: usize,
    phrase_limit_samples: usize,
    waited: usize,
    silence_run: usize,
    phrase: Vec<f32>,
    started: bool,
}

impl Endpointer {
    #[must_use]
    pub fn new(config: &EndpointConfig, sample_rate: u32) -> Self {
        Self {
            threshold: config.threshold,
            pause_samples: samples_for(config.pause, sample_rate).max(1),
            timeout_samples: samples_for(config.timeout, sample_rate).max(1),
            phrase_limit_samples: samples_for(config.phrase_limit, sample_rate).max(1),
            waited: 0,
            silence_run: 0,
            phrase: Vec::new(),
            started: false,
        }
    }

    /// Feed one frame of mono samples.
    pub fn push(&mut self, frame: &[f32]) -> Endpoint {
        let loud = rms_energy(frame) > self.threshold;

        if !self.started {
            if !loud {
                self.waited += frame.len();
                return if self.waited >= self.timeout_samples {
                    Endpoint::TimedOut
                } else {
                    Endpoint::Waiting
                };
            }
            self.started = true;
        }

        self.phrase.extend_from_slice(frame);
        if loud {
            self.silence_run = 0;
        } else {
            self.silence_run += frame.len();
        }

        if self.silence_run >= self.pause_samples || self.phrase.len() >= self.phrase_limit_samples
        {
            Endpoint::Complete
        } else {
            Endpoint::Recording
        }
    }

    /// Whether speech has started.
    #[must_use]
    pub const fn has_speech(&self) -> bool {
        self.started
    }

    /// The recorded phrase, trailing pause included.
    #[must_use]
    pub fn into_phrase(self) -> Vec<f32> {
        self.phrase
    }
}

/// Parameters for one blocking recording.
#[derive(Debug, Clone, Copy)]
struct RecordParams {
    base_threshold: f32,
    dynamic_threshold: bool,
    pause: Duration,
    calibration: Option<Duration>,
    timeout: Duration,
    phrase_limit: Duration,
}

/// A recorded phrase at the device sample rate.
struct Phrase {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// [`SpeechRecognizer`] on the default microphone.
pub struct MicrophoneCapture {
    transcriber: Arc<dyn Transcriber>,
    settings: SpeechSettings,

    /// Held for the duration of one capture call.
    mic: Mutex<()>,
}

impl MicrophoneCapture {
    pub fn new(transcriber: Arc<dyn Transcriber>, settings: SpeechSettings) -> Self {
        Self {
            transcriber,
            settings,
            mic: Mutex::new(()),
        }
    }

    fn params(&self, options: CaptureOptions) -> RecordParams {
        RecordParams {
            base_threshold: self.settings.energy_threshold,
            dynamic_threshold: self.settings.dynamic_energy_threshold,
            pause: self.settings.pause_threshold(),
            calibration: options.calibrate.then(|| self.settings.calibration()),
            timeout: options.timeout,
            phrase_limit: options.phrase_time_limit,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneCapture {
    async fn capture(&self, options: CaptureOptions) -> Result<String, CaptureError> {
        let _mic = self.mic.lock().await;

        // Dropping this future (caller cancelled) stops the recording thread.
        let cancel = CancellationToken::new();
        let _stop_recording = cancel.clone().drop_guard();

        let params = self.params(options);
        let recorded = tokio::task::spawn_blocking(move || record_phrase(params, &cancel))
            .await
            .map_err(|e| CaptureError::Device(format!("capture thread failed: {e}")))??;

        let Some(phrase) = recorded else {
            tracing::debug!("No speech before listen timeout");
            return Err(CaptureError::Timeout);
        };

        let wav = encode_wav(&phrase.samples, phrase.sample_rate)?;
        let text = self.transcriber.transcribe(wav).await?;

        if text.trim().is_empty() {
            return Err(CaptureError::Unintelligible);
        }
        tracing::debug!(chars = text.len(), "Captured speech");
        Ok(text)
    }
}

/// Blocking: open the microphone and record one phrase.
///
/// Returns `None` when no speech started before the timeout.
fn record_phrase(
    params: RecordParams,
    cancel: &CancellationToken,
) -> Result<Option<Phrase>, VoiceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(VoiceError::NoInputDevice)?;
    let config = device
        .default_input_config()
        .map_err(|e| VoiceError::InputStreamError(e.to_string()))?;
    let sample_rate = config.sample_rate().0;

    let (tx, rx) = mpsc::channel::<Vec<f32>>();
    let stream = build_input_stream(&device, &config, tx)?;
    stream
        .play()
        .map_err(|e| VoiceError::InputStreamError(e.to_string()))?;

    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        "Microphone open"
    );

    let frame_len = samples_for(FRAME, sample_rate).max(1);
    let mut frames = FrameReader::new(rx, frame_len);

    let mut threshold = params.base_threshold;
    if let Some(calibration) = params.calibration {
        let wanted = samples_for(calibration, sample_rate);
        let mut ambient = Vec::with_capacity(wanted);
        let deadline = Instant::now() + calibration + Duration::from_secs(1);
        while ambient.len() < wanted && Instant::now() < deadline {
            match frames.next(cancel)? {
                Some(frame) => ambient.extend_from_slice(&frame),
                None => continue,
            }
        }
        threshold =
            calibrated_threshold(params.base_threshold, rms_energy(&ambient), params.dynamic_threshold);
        tracing::debug!(threshold, "Calibrated for ambient noise");
    }

    let mut endpointer = Endpointer::new(
        &EndpointConfig {
            threshold,
            pause: params.pause,
            timeout: params.timeout,
            phrase_limit: params.phrase_limit,
        },
        sample_rate,
    );

    // Wall-clock bound in case the device stops delivering samples.
    let deadline = Instant::now() + params.timeout + params.phrase_limit + Duration::from_secs(1);

    let outcome = loop {
        if Instant::now() >= deadline {
            break if endpointer.has_speech() {
                Endpoint::Complete
            } else {
                Endpoint::TimedOut
            };
        }
        let Some(frame) = frames.next(cancel)? else {
            continue;
        };
        match endpointer.push(&frame) {
            Endpoint::Waiting | Endpoint::Recording => {}
            done => break done,
        }
    };

    drop(stream);

    match outcome {
        Endpoint::Complete => Ok(Some(Phrase {
            samples: endpointer.into_phrase(),
            sample_rate,
        })),
        _ => Ok(None),
    }
}

/// Re-chunks the device callback buffers into fixed-size frames.
struct FrameReader {
    rx: mpsc::Receiver<Vec<f32>>,
    pending: Vec<f32>,
    frame_len: usize,
}

impl FrameReader {
    const POLL: Duration = Duration::from_millis(50);

    fn new(rx: mpsc::Receiver<Vec<f32>>, frame_len: usize) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            frame_len,
        }
    }

    /// Next full frame, or `None` if no full frame arrived within one poll.
    fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<f32>>, VoiceError> {
        if cancel.is_cancelled() {
            return Err(VoiceError::Cancelled);
        }
        if self.pending.len() < self.frame_len {
            match self.rx.recv_timeout(Self::POLL) {
                Ok(data) => self.pending.extend_from_slice(&data),
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(VoiceError::InputStreamError(
                        "input stream closed".to_string(),
                    ));
                }
            }
        }
        if self.pending.len() < self.frame_len {
            return Ok(None);
        }
        Ok(Some(self.pending.drain(..self.frame_len).collect()))
    }
}

/// Build a cpal input stream that forwards mono f32 buffers over `tx`.
fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, VoiceError> {
    let stream_config: StreamConfig = config.clone().into();
    let channels = usize::from(stream_config.channels.max(1));
    let sample_format = config.sample_format();

    let err_fn = |err: cpal::StreamError| {
        tracing::error!(%err, "Audio input stream error");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(downmix(data, channels, |s| s));
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(downmix(data, channels, |s| f32::from(s) / 32768.0));
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &stream_config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                #[allow(clippy::cast_precision_loss)]
                let _ = tx.send(downmix(data, channels, |s| s as f32 / 2_147_483_648.0));
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(VoiceError::InputStreamError(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    stream.map_err(|e| VoiceError::InputStreamError(e.to_string()))
}

/// Convert interleaved frames to mono f32 by averaging channels.
fn downmix<T: Copy>(data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| to_f32(s)).collect();
    }
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    data.chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1_000;

    fn tone(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn config() -> EndpointConfig {
        EndpointConfig {
            threshold: 300.0,
            pause: Duration::from_millis(100),
            timeout: Duration::from_millis(500),
            phrase_limit: Duration::from_secs(2),
        }
    }

    #[test]
    fn rms_uses_integer_scale() {
        assert!((rms_energy(&tone(0.5, 100)) - 16384.0).abs() < 1.0);
        assert!(rms_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn dynamic_threshold_never_drops_below_base() {
        assert!((calibrated_threshold(300.0, 100.0, true) - 300.0).abs() < f32::EPSILON);
        assert!((calibrated_threshold(300.0, 400.0, true) - 600.0).abs() < f32::EPSILON);
        assert!((calibrated_threshold(300.0, 400.0, false) - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn silence_times_out() {
        let mut ep = Endpointer::new(&config(), RATE);
        let frame = tone(0.0, 50);
        let mut outcome = Endpoint::Waiting;
        for _ in 0..10 {
            outcome = ep.push(&frame);
        }
        assert_eq!(outcome, Endpoint::TimedOut);
        assert!(ep.into_phrase().is_empty());
    }

    #[test]
    fn phrase_ends_after_pause() {
        let mut ep = Endpointer::new(&config(), RATE);
        assert_eq!(ep.push(&tone(0.0, 50)), Endpoint::Waiting);
        assert_eq!(ep.push(&tone(0.2, 50)), Endpoint::Recording);
        assert_eq!(ep.push(&tone(0.2, 50)), Endpoint::Recording);
        assert_eq!(ep.push(&tone(0.0, 50)), Endpoint::Recording);
        assert_eq!(ep.push(&tone(0.0, 50)), Endpoint::Complete);
        // Leading silence is not part of the phrase.
        assert_eq!(ep.into_phrase().len(), 200);
    }

    #[test]
    fn phrase_limit_cuts_continuous_speech() {
        let mut ep = Endpointer::new(&config(), RATE);
        let frame = tone(0.2, 100);
        let mut pushes = 0;
        while ep.push(&frame) == Endpoint::Recording {
            pushes += 1;
            assert!(pushes < 100, "phrase limit never reached");
        }
        assert_eq!(ep.into_phrase().len(), 2_000);
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [0.5_f32, -0.5, 1.0, 0.0];
        assert_eq!(downmix(&stereo, 2, |s| s), vec![0.0, 0.5]);
        assert_eq!(downmix(&[16384_i16], 1, |s| f32::from(s) / 32768.0), vec![0.5]);
    }
}
