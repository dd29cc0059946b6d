//! Error taxonomy shared by every component.
//!
//! Each external-call site converts library errors into one of these kinds
//! before the error crosses a component boundary. Only
//! [`SessionError::MissingVoiceProfile`] is fatal to a session.

/// Outcome of a speech capture that produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// No speech started before the listen timeout elapsed.
    #[error("No speech detected before the listen timeout")]
    Timeout,

    /// Speech was recorded but the recognizer could not make out any words.
    #[error("Speech was not intelligible")]
    Unintelligible,

    /// The microphone or the recognition service failed.
    #[error("Speech capture device error: {0}")]
    Device(String),
}

impl CaptureError {
    /// Whether the outcome is an expected "no result" rather than a fault.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unintelligible)
    }
}

/// Failure to obtain a reply from the language model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Connection failure, request timeout, or non-success HTTP status.
    #[error("Chat completion request failed: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected chat completion response: {0}")]
    Schema(String),

    /// The service answered with no usable text.
    #[error("Chat completion returned an empty reply")]
    EmptyResult,
}

/// Failure to synthesize one chunk of speech.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// No voice profile exists for the requested speaker.
    #[error("No voice profile found for speaker '{0}'")]
    MissingVoiceProfile(String),

    /// The TTS engine failed or returned unusable audio.
    #[error("Speech synthesis failed: {0}")]
    Engine(String),
}

/// Failure of the audio output device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Audio output device error: {0}")]
    Device(String),
}

/// Errors that prevent a session from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session speaker has no voice profile; setup must run first.
    #[error("No voice profile for speaker '{speaker}'. {setup_hint}")]
    MissingVoiceProfile { speaker: String, setup_hint: String },

    /// A session is already running on this orchestrator.
    #[error("A session is already running")]
    AlreadyRunning,

    /// Reading typed input failed.
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_unintelligible_are_expected() {
        assert!(CaptureError::Timeout.is_expected());
        assert!(CaptureError::Unintelligible.is_expected());
        assert!(!CaptureError::Device("no mic".into()).is_expected());
    }

    #[test]
    fn missing_profile_message_names_speaker_and_step() {
        let err = SessionError::MissingVoiceProfile {
            speaker: "alice".into(),
            setup_hint: "Create data/models/alice_prompt.wav first.".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("alice_prompt.wav"));
    }
}
