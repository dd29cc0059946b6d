//! Audio adapter error types.
//!
//! [`VoiceError`] stays inside this crate's adapters. Before crossing a port
//! boundary it is folded into the shared taxonomy in `voxagent_core::error`.

use voxagent_core::{CaptureError, PlaybackError};

/// Errors raised by the audio devices and the HTTP speech services.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// No audio input device found.
    #[error("No audio input device found")]
    NoInputDevice,

    /// Failed to open audio input stream.
    #[error("Failed to open audio input stream: {0}")]
    InputStreamError(String),

    /// Failed to open audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// The dedicated audio output thread exited.
    #[error("Audio output thread is not running")]
    AudioThreadDied,

    /// Failed to encode captured audio.
    #[error("Failed to encode audio: {0}")]
    EncodingError(String),

    /// The speech-recognition service failed.
    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    /// IO error (voice prompt files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was abandoned by its caller.
    #[error("Voice operation cancelled")]
    Cancelled,
}

impl From<VoiceError> for CaptureError {
    fn from(err: VoiceError) -> Self {
        match err {
            // Only observed after the caller has already moved on.
            VoiceError::Cancelled => Self::Timeout,
            other => Self::Device(other.to_string()),
        }
    }
}

impl From<VoiceError> for PlaybackError {
    fn from(err: VoiceError) -> Self {
        Self::Device(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_failures_map_to_capture_device_error() {
        let err: CaptureError = VoiceError::NoInputDevice.into();
        assert_eq!(err, CaptureError::Device("No audio input device found".into()));
    }

    #[test]
    fn cancelled_capture_is_an_expected_outcome() {
        let err: CaptureError = VoiceError::Cancelled.into();
        assert!(err.is_expected());
    }
}
