//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where concrete adapters are wired together:
//! - Settings (defaults, TOML file, environment, flags)
//! - Voice-prompt store and voice-cloning synthesizer
//! - Audio output device and playback queue
//! - Microphone capture with HTTP transcription
//! - Chat-completions client and response generator
//!
//! Command handlers receive a [`CliContext`] and ask it for what they need.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use voxagent_agent::{
    ChatCompletionsClient, GeneratorConfig, LlmClientConfig, Orchestrator, OrchestratorConfig,
    ResponseGenerator,
};
use voxagent_core::{AgentSettings, SpeechRecognizer};
use voxagent_voice::{
    CloningSynthesizer, FsVoicePromptStore, HttpTranscriber, MicrophoneCapture, PlaybackEvent,
    RodioOutput, SpeechQueue, SynthesisConfig, TranscriberConfig,
};

use crate::parser::Cli;

/// Overrides taken from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub stt_api_key: Option<String>,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone(),
            api_key: cli.api_key.clone(),
            stt_api_key: cli.stt_api_key.clone(),
        }
    }

    /// Load the settings file and apply the overrides on top.
    pub fn load_settings(&self) -> Result<AgentSettings> {
        let mut settings =
            AgentSettings::load(self.config_path.as_deref()).context("Failed to load settings")?;

        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            settings.llm.api_key = Some(key.clone());
        }
        if let Some(key) = self.stt_api_key.as_ref().filter(|k| !k.is_empty()) {
            settings.speech.stt_api_key = Some(key.clone());
        }
        Ok(settings)
    }
}

/// Resolved settings plus the adapters every command shares.
pub struct CliContext {
    pub settings: AgentSettings,
    pub prompts: Arc<FsVoicePromptStore>,
}

impl CliContext {
    /// Use `speaker` as the session speaker instead of the configured one.
    pub fn set_speaker(&mut self, speaker: Option<String>) {
        if let Some(speaker) = speaker {
            self.settings.agent.speaker = speaker;
        }
    }

    pub fn chat_client(&self) -> Result<ChatCompletionsClient> {
        ChatCompletionsClient::new(LlmClientConfig::from(&self.settings.llm))
            .context("Failed to create chat-completions client")
    }

    fn synthesizer(&self) -> Result<CloningSynthesizer> {
        CloningSynthesizer::new(
            SynthesisConfig::from(&self.settings.tts),
            Arc::clone(&self.prompts) as _,
        )
        .context("Failed to create voice synthesizer")
    }

    /// Open the speaker and build a playback queue that reports progress.
    pub fn speech_queue(
        &self,
    ) -> Result<(SpeechQueue, tokio::sync::mpsc::UnboundedReceiver<PlaybackEvent>)> {
        let output = RodioOutput::open().context("Failed to open audio output")?;
        Ok(SpeechQueue::with_events(
            Arc::new(self.synthesizer()?),
            Arc::new(output),
            self.settings.playback.max_chunk_chars,
        ))
    }

    fn recognizer(&self) -> Result<Arc<dyn SpeechRecognizer>> {
        let transcriber = HttpTranscriber::new(TranscriberConfig::from(&self.settings.speech))
            .context("Failed to create transcription client")?;
        Ok(Arc::new(MicrophoneCapture::new(
            Arc::new(transcriber),
            self.settings.speech.clone(),
        )))
    }

    /// Wire a complete orchestrator around `queue`.
    pub fn orchestrator(&self, queue: SpeechQueue) -> Result<Orchestrator> {
        let generator = ResponseGenerator::new(
            Arc::new(self.chat_client()?),
            GeneratorConfig::from(&self.settings.llm),
        );
        Ok(Orchestrator::new(
            self.recognizer()?,
            generator,
            queue,
            Arc::clone(&self.prompts) as _,
            OrchestratorConfig::from_settings(&self.settings),
        ))
    }
}

/// Build the CLI context from resolved settings.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    let settings = config.load_settings()?;
    let prompts = Arc::new(FsVoicePromptStore::new(&settings.tts.models_dir));
    tracing::debug!(models_dir = %settings.tts.models_dir.display(), "Voice prompt store ready");
    Ok(CliContext { settings, prompts })
}
