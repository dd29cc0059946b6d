//! Core types for the voxagent voice agent.
//!
//! This crate has no audio or network dependencies. It defines the
//! conversation domain, the error taxonomy, the settings model and the port
//! traits that the voice and agent crates implement or consume.

pub mod domain;
pub mod error;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AgentMode, ConversationTurn, DEFAULT_MAX_HISTORY_TURNS, History, ParseModeError, Role,
    SessionState, SpeechRequest, SynthesizedAudio,
};
pub use error::{CaptureError, GenerationError, PlaybackError, SessionError, SynthesisError};
pub use ports::{
    AudioOutput, CaptureOptions, ChatCompletion, ChatMessage, ChatRequest, SpeechRecognizer,
    VoicePrompt, VoicePromptStore, VoiceSynthesizer,
};
pub use settings::{
    AgentSettings, DEFAULT_CONTEXT_TURNS, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL,
    DEFAULT_MAX_CHUNK_CHARS, DEFAULT_PERSONA, DEFAULT_SPEAKER, DEFAULT_TTS_SAMPLE_RATE,
    DEFAULT_WAKE_PHRASE, LlmSettings, PlaybackSettings, SessionSettings, SettingsError,
    SpeechSettings, TtsSettings,
};
