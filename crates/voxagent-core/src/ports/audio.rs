//! Audio output port.

use async_trait::async_trait;

use crate::domain::SynthesizedAudio;
use crate::error::PlaybackError;

/// Abstraction over the speaker.
///
/// `play` resolves once the audio has finished playing or [`stop`] was
/// called, whichever comes first. `stop` takes `&self` so it can be invoked
/// from another task while `play` is pending.
///
/// [`stop`]: AudioOutput::stop
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn play(&self, audio: SynthesizedAudio) -> Result<(), PlaybackError>;

    /// Silence any in-progress playback immediately.
    fn stop(&self);
}
