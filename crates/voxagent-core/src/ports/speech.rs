//! Speech input/output ports: capture, synthesis and the voice-prompt store.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::SynthesizedAudio;
use crate::error::{CaptureError, SynthesisError};

/// Parameters of a single capture call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// How long to wait for speech to start.
    pub timeout: Duration,

    /// Maximum length of a single phrase once speech has started.
    pub phrase_time_limit: Duration,

    /// Run an ambient-noise calibration pass before listening.
    pub calibrate: bool,
}

/// Speech capture: microphone plus speech recognition.
///
/// Implementations hold the microphone exclusively for the duration of one
/// call and release it on every exit path.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn capture(&self, options: CaptureOptions) -> Result<String, CaptureError>;
}

/// Voice-cloning text-to-speech.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Synthesize one chunk of text in `speaker`'s voice.
    ///
    /// `text` should already be chunked to a length the engine handles well;
    /// the playback queue takes care of that.
    async fn synthesize(&self, text: &str, speaker: &str)
    -> Result<SynthesizedAudio, SynthesisError>;
}

/// A stored reference that lets the TTS engine imitate a speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePrompt {
    pub speaker: String,

    /// Reference audio passed to the engine.
    pub path: PathBuf,

    /// Optional voice characteristics recorded when the prompt was created.
    pub characteristics: Option<serde_json::Value>,
}

/// Keyed lookup of voice prompts by speaker identity.
pub trait VoicePromptStore: Send + Sync {
    fn lookup(&self, speaker: &str) -> Option<VoicePrompt>;

    /// Speakers that currently have a usable prompt, sorted.
    fn list_voices(&self) -> Vec<String>;

    /// Human-readable instruction for creating a missing prompt.
    fn setup_hint(&self, speaker: &str) -> String {
        format!("Create a voice prompt for '{speaker}' before starting a session.")
    }
}
