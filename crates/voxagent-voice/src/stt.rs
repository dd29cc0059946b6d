//! Speech-to-text via an OpenAI-compatible transcription endpoint.

use std::time::Duration;

use async_trait::async_trait;
use voxagent_core::SpeechSettings;

use crate::error::VoiceError;

/// Backend-agnostic speech-to-text engine.
///
/// Takes a complete WAV file and returns the recognized text, or an empty
/// string when nothing intelligible was said.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, VoiceError>;
}

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Configuration for [`HttpTranscriber`].
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Base URL; requests go to `{base_url}/audio/transcriptions`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub language: String,
    pub timeout: Duration,
}

impl From<&SpeechSettings> for TranscriberConfig {
    fn from(settings: &SpeechSettings) -> Self {
        Self {
            base_url: settings.stt_base_url.clone(),
            model: settings.stt_model.clone(),
            api_key: settings.stt_api_key.clone(),
            language: settings.language.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Remote transcription over multipart HTTP.
pub struct HttpTranscriber {
    client: reqwest::Client,
    config: TranscriberConfig,
}

impl HttpTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VoiceError::TranscriptionError(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, VoiceError> {
        tracing::debug!(audio_bytes = wav.len(), "Starting transcription");

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("phrase.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::TranscriptionError(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone());

        let mut request = self.client.post(self.endpoint()).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::TranscriptionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TranscriptionError(format!(
                "service returned {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::TranscriptionError(e.to_string()))?;

        let text = result.text.trim().to_string();
        tracing::debug!(chars = text.len(), "Transcription complete");
        Ok(text)
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VoiceError::EncodingError(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample)
                .map_err(|e| VoiceError::EncodingError(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceError::EncodingError(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
