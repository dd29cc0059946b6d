//! Session domain types: interaction modes and per-session state.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::conversation::History;

/// How the user interacts with the agent for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentMode {
    /// Hands-free: listen for the wake phrase, then hold one exchange.
    WakeWordLoop,

    /// Typed input, spoken replies.
    TextInteractive,

    /// Spoken input and spoken replies until an exit keyword is heard.
    VoiceInteractive,
}

impl AgentMode {
    /// CLI name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WakeWordLoop => "wake-word",
            Self::TextInteractive => "text",
            Self::VoiceInteractive => "voice",
        }
    }

    /// Whether the mode reads from the microphone.
    #[must_use]
    pub const fn uses_microphone(&self) -> bool {
        matches!(self, Self::WakeWordLoop | Self::VoiceInteractive)
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent mode '{0}' (expected wake-word, text or voice)")]
pub struct ParseModeError(pub String);

impl FromStr for AgentMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wake-word" | "wakeword" | "wake" | "1" => Ok(Self::WakeWordLoop),
            "text" | "interactive" | "2" => Ok(Self::TextInteractive),
            "voice" | "voice-interactive" | "3" => Ok(Self::VoiceInteractive),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// State of one conversation session.
///
/// Owned exclusively by the orchestrator; no other component mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: AgentMode,
    pub history: History,
    pub running: bool,
}

impl SessionState {
    #[must_use]
    pub const fn new(mode: AgentMode, history: History) -> Self {
        Self {
            mode,
            history,
            running: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_cli_names() {
        assert_eq!("wake-word".parse(), Ok(AgentMode::WakeWordLoop));
        assert_eq!("TEXT".parse(), Ok(AgentMode::TextInteractive));
        assert_eq!(" voice ".parse(), Ok(AgentMode::VoiceInteractive));
        assert_eq!("3".parse(), Ok(AgentMode::VoiceInteractive));
        assert!("shout".parse::<AgentMode>().is_err());
    }

    #[test]
    fn display_matches_cli_name() {
        for mode in [
            AgentMode::WakeWordLoop,
            AgentMode::TextInteractive,
            AgentMode::VoiceInteractive,
        ] {
            assert_eq!(mode.to_string().parse(), Ok(mode));
        }
    }

    #[test]
    fn only_voice_modes_use_microphone() {
        assert!(AgentMode::WakeWordLoop.uses_microphone());
        assert!(AgentMode::VoiceInteractive.uses_microphone());
        assert!(!AgentMode::TextInteractive.uses_microphone());
    }

    #[test]
    fn new_session_is_not_running() {
        let state = SessionState::new(AgentMode::TextInteractive, History::default());
        assert!(!state.running);
        assert!(state.history.is_empty());
    }
}
