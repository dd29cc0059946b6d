//! Speech output domain types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A unit of work for the playback queue: speak `text` in `speaker`'s voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Process-wide sequence number, increasing in construction order.
    pub id: u64,
    pub text: String,
    pub speaker: String,
    pub submitted_at: DateTime<Utc>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            text: text.into(),
            speaker: speaker.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Audio produced by speech synthesis.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Mono PCM f32 samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,

    /// Sample rate of the audio in Hz.
    pub sample_rate: u32,

    /// Duration of the audio.
    pub duration: Duration,
}

impl SynthesizedAudio {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            #[allow(clippy::cast_precision_loss)]
            Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate))
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
