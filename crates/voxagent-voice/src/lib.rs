//! Audio side of voxagent.
//!
//! Adapters for the microphone ([`MicrophoneCapture`] + [`HttpTranscriber`]),
//! the voice-cloning engine ([`CloningSynthesizer`]), the voice-prompt store
//! ([`FsVoicePromptStore`]) and the speaker ([`RodioOutput`]), plus the
//! order-preserving [`SpeechQueue`] that ties synthesis and playback together.

pub mod capture;
pub mod error;
pub mod output;
pub mod prompt_store;
pub mod queue;
pub mod stt;
pub mod synthesis;
pub mod text_utils;

// Re-export key types for convenience
pub use capture::MicrophoneCapture;
pub use error::VoiceError;
pub use output::RodioOutput;
pub use prompt_store::FsVoicePromptStore;
pub use queue::{PlaybackEvent, SpeechQueue};
pub use stt::{HttpTranscriber, Transcriber, TranscriberConfig};
pub use synthesis::{CloningSynthesizer, SynthesisConfig};
