//! Port definitions: the seams between the orchestration core and the
//! external collaborators.
//!
//! | Port | Collaborator | Adapter |
//! |---|---|---|
//! | [`SpeechRecognizer`] | microphone + speech-recognition service | `voxagent-voice::capture` |
//! | [`ChatCompletion`] | LLM chat-completion service | `voxagent-agent::llm` |
//! | [`VoiceSynthesizer`] | voice-cloning TTS engine | `voxagent-voice::synthesis` |
//! | [`AudioOutput`] | speaker / audio output device | `voxagent-voice::output` |
//! | [`VoicePromptStore`] | filesystem voice-prompt store | `voxagent-voice::prompt_store` |
//!
//! All async traits use [`async_trait`] so they stay object-safe and can be
//! held as `Arc<dyn …>` by the orchestrator and the playback queue.

mod audio;
mod chat;
mod speech;

pub use audio::AudioOutput;
pub use chat::{ChatCompletion, ChatMessage, ChatRequest};
pub use speech::{CaptureOptions, SpeechRecognizer, VoicePrompt, VoicePromptStore, VoiceSynthesizer};
