//! Agent settings and validation.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment/CLI overrides applied by the binary. Every section uses
//! `#[serde(default)]` so a config file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_HISTORY_TURNS;

/// Default chat-completions endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.x.ai/v1";

/// Default chat model.
pub const DEFAULT_LLM_MODEL: &str = "grok-beta";

/// Default number of history turns sent with each request.
pub const DEFAULT_CONTEXT_TURNS: usize = 8;

/// Default speaker identity.
pub const DEFAULT_SPEAKER: &str = "user";

/// Default wake phrase.
pub const DEFAULT_WAKE_PHRASE: &str = "assistant";

/// Default maximum characters per synthesized chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 100;

/// Sample rate of the voice-cloning engine's PCM output.
pub const DEFAULT_TTS_SAMPLE_RATE: u32 = 24_000;

/// Default persona prompt sent as the system message.
pub const DEFAULT_PERSONA: &str = "You are a voice assistant with a sense of humor and a rebellious streak. \
You're helpful, witty, and occasionally sarcastic. You have opinions and aren't afraid to show them. \
Keep your responses concise, engaging, and human-like, since they will be spoken aloud. \
Remember: you're talking to a real person, so be engaging and natural in your conversation.";

/// Errors raised while loading or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Top-level agent settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub llm: LlmSettings,
    pub speech: SpeechSettings,
    pub tts: TtsSettings,
    pub agent: SessionSettings,
    pub playback: PlaybackSettings,
}

/// Chat-completion service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,

    /// Bearer token. Normally supplied through the environment, never
    /// written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,

    /// Number of most recent history turns included in each request.
    pub context_turns: usize,

    /// System prompt that sets the agent's persona.
    pub persona: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            temperature: 0.8,
            max_tokens: 200,
            timeout_secs: 30,
            context_turns: DEFAULT_CONTEXT_TURNS,
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl LlmSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Microphone capture and speech-recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// OpenAI-compatible transcription endpoint base URL.
    pub stt_base_url: String,
    pub stt_model: String,
    #[serde(skip_serializing)]
    pub stt_api_key: Option<String>,
    pub language: String,

    /// Minimum RMS energy (i16 scale) treated as speech.
    pub energy_threshold: f32,
    /// Raise the threshold from the calibrated ambient level.
    pub dynamic_energy_threshold: bool,
    /// Trailing silence that ends a phrase.
    pub pause_threshold_ms: u64,
    /// Length of the ambient-noise calibration pass.
    pub calibration_ms: u64,

    pub wake_timeout_secs: u64,
    pub wake_phrase_limit_secs: u64,
    pub conversation_timeout_secs: u64,
    pub listen_timeout_secs: u64,
    pub phrase_limit_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            stt_base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "whisper-1".to_string(),
            stt_api_key: None,
            language: "en".to_string(),
            energy_threshold: 300.0,
            dynamic_energy_threshold: true,
            pause_threshold_ms: 800,
            calibration_ms: 500,
            wake_timeout_secs: 5,
            wake_phrase_limit_secs: 3,
            conversation_timeout_secs: 10,
            listen_timeout_secs: 30,
            phrase_limit_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl SpeechSettings {
    #[must_use]
    pub const fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    #[must_use]
    pub const fn calibration(&self) -> Duration {
        Duration::from_millis(self.calibration_ms)
    }
}

/// Voice-cloning TTS engine and voice-prompt store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub base_url: String,
    pub sample_rate: u32,
    pub temperature: f32,
    pub silence_padding_secs: f32,
    pub timeout_secs: u64,

    /// Directory holding `<speaker>_prompt.wav` voice prompts.
    pub models_dir: PathBuf,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8020".to_string(),
            sample_rate: DEFAULT_TTS_SAMPLE_RATE,
            temperature: 0.7,
            silence_padding_secs: 0.5,
            timeout_secs: 120,
            models_dir: PathBuf::from("data/models"),
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub speaker: String,
    pub wake_phrase: String,
    pub max_history_turns: usize,
    pub wake_greeting: String,
    pub voice_greeting: String,
    pub farewell: String,
    pub apology: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            speaker: DEFAULT_SPEAKER.to_string(),
            wake_phrase: DEFAULT_WAKE_PHRASE.to_string(),
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            wake_greeting: "Hey there! What's on your mind?".to_string(),
            voice_greeting: "Hey! I'm your assistant. What would you like to chat about?"
                .to_string(),
            farewell: "Alright, catch you later!".to_string(),
            apology: "I apologize, but I'm having trouble generating a response right now. \
                      Please try again."
                .to_string(),
        }
    }
}

/// Playback queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub max_chunk_chars: usize,

    /// Upper bound on how long capture waits for playback to drain.
    pub drain_timeout_secs: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            drain_timeout_secs: 120,
        }
    }
}

impl PlaybackSettings {
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl AgentSettings {
    /// Location of the per-user settings file, if a config dir exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxagent").join("config.toml"))
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the per-user file is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => {
                    tracing::debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml(&text).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), "Loaded settings");
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without validating.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reject values that would break the runtime invariants.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.agent.max_history_turns == 0 {
            return Err(SettingsError::Invalid(
                "agent.max_history_turns must be at least 1".into(),
            ));
        }
        if self.llm.context_turns == 0 || self.llm.context_turns > self.agent.max_history_turns {
            return Err(SettingsError::Invalid(format!(
                "llm.context_turns must be between 1 and agent.max_history_turns ({})",
                self.agent.max_history_turns
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SettingsError::Invalid(
                "llm.temperature must be within 0.0..=2.0".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(SettingsError::Invalid(
                "llm.max_tokens must be at least 1".into(),
            ));
        }
        if self.playback.max_chunk_chars == 0 {
            return Err(SettingsError::Invalid(
                "playback.max_chunk_chars must be at least 1".into(),
            ));
        }
        if self.tts.sample_rate == 0 {
            return Err(SettingsError::Invalid(
                "tts.sample_rate must be non-zero".into(),
            ));
        }
        if self.agent.speaker.trim().is_empty() {
            return Err(SettingsError::Invalid("agent.speaker must not be empty".into()));
        }
        Ok(())
    }
}
