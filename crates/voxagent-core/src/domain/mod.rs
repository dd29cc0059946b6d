//! Domain types for conversation sessions.
//!
//! These types are independent of any audio or network infrastructure.

pub mod conversation;
pub mod session;
pub mod speech;

pub use conversation::{ConversationTurn, DEFAULT_MAX_HISTORY_TURNS, History, Role};
pub use session::{AgentMode, ParseModeError, SessionState};
pub use speech::{SpeechRequest, SynthesizedAudio};
