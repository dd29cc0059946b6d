//! Voice-cloning synthesis client.
//!
//! Talks to an HTTP voice-cloning engine. Each call sends one text chunk and
//! the path of the speaker's reference clip, and receives raw little-endian
//! PCM16 mono audio at the engine's fixed sample rate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use voxagent_core::{
    SynthesisError, SynthesizedAudio, TtsSettings, VoicePromptStore, VoiceSynthesizer,
};

/// Configuration for the voice-cloning engine client.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Engine base URL; requests go to `{base_url}/synthesize`.
    pub base_url: String,

    /// Sample rate of the PCM the engine returns.
    pub sample_rate: u32,

    pub temperature: f32,
    pub silence_padding_secs: f32,
    pub timeout: Duration,
}

impl From<&TtsSettings> for SynthesisConfig {
    fn from(settings: &TtsSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            sample_rate: settings.sample_rate,
            temperature: settings.temperature,
            silence_padding_secs: settings.silence_padding_secs,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    speaker_voice_reference: String,
    temperature: f32,
    silence_padding: f32,
}

/// [`VoiceSynthesizer`] backed by a remote voice-cloning engine.
pub struct CloningSynthesizer {
    client: reqwest::Client,
    store: Arc<dyn VoicePromptStore>,
    config: SynthesisConfig,
}

impl CloningSynthesizer {
    pub fn new(
        config: SynthesisConfig,
        store: Arc<dyn VoicePromptStore>,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SynthesisError::Engine(e.to_string()))?;

        Ok(Self {
            client,
            store,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/synthesize", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl VoiceSynthesizer for CloningSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        speaker: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let prompt = self
            .store
            .lookup(speaker)
            .ok_or_else(|| SynthesisError::MissingVoiceProfile(speaker.to_string()))?;

        let body = SynthesizeBody {
            text,
            speaker_voice_reference: prompt.path.display().to_string(),
            temperature: self.config.temperature,
            silence_padding: self.config.silence_padding_secs,
        };

        tracing::debug!(speaker, chars = text.len(), "Requesting speech synthesis");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Engine(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Engine(format!(
                "engine returned {status}: {detail}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Engine(e.to_string()))?;

        let samples = decode_pcm16(&bytes)?;
        let audio = SynthesizedAudio::new(samples, self.config.sample_rate);

        tracing::debug!(
            speaker,
            duration_ms = audio.duration.as_millis(),
            "Speech synthesized"
        );
        Ok(audio)
    }
}

/// Decode little-endian PCM16 mono into f32 samples in `[-1.0, 1.0)`.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, SynthesisError> {
    if bytes.is_empty() {
        return Err(SynthesisError::Engine("engine returned no audio".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(SynthesisError::Engine(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxagent_core::VoicePrompt;

    struct EmptyStore;

    impl VoicePromptStore for EmptyStore {
        fn lookup(&self, _speaker: &str) -> Option<VoicePrompt> {
            None
        }

        fn list_voices(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn decodes_little_endian_samples() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80];
        let samples = decode_pcm16(&bytes).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn rejects_empty_and_odd_payloads() {
        assert!(decode_pcm16(&[]).is_err());
        assert!(decode_pcm16(&[0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = SynthesisConfig {
            base_url: "http://127.0.0.1:8020/".into(),
            ..SynthesisConfig::from(&TtsSettings::default())
        };
        let synth = CloningSynthesizer::new(config, Arc::new(EmptyStore)).unwrap();
        assert_eq!(synth.endpoint(), "http://127.0.0.1:8020/synthesize");
    }

    #[tokio::test]
    async fn missing_profile_fails_before_any_request() {
        let synth =
            CloningSynthesizer::new(SynthesisConfig::from(&TtsSettings::default()), Arc::new(EmptyStore))
                .unwrap();
        let err = synth.synthesize("hello", "nobody").await.unwrap_err();
        assert_eq!(err, SynthesisError::MissingVoiceProfile("nobody".into()));
    }
}
