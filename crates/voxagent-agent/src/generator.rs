//! Response generation over a bounded context window.

use std::sync::Arc;

use voxagent_core::{
    ChatCompletion, ChatMessage, ChatRequest, ConversationTurn, GenerationError, History,
    LlmSettings,
};

/// Sampling and context parameters for [`ResponseGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Most recent history turns sent with each request.
    pub context_turns: usize,

    /// System prompt placed before the history.
    pub persona: String,
}

impl From<&LlmSettings> for GeneratorConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            context_turns: settings.context_turns,
            persona: settings.persona.clone(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&LlmSettings::default())
    }
}

/// Turns a conversation history into one reply from the language model.
pub struct ResponseGenerator {
    chat: Arc<dyn ChatCompletion>,
    config: GeneratorConfig,
}

impl ResponseGenerator {
    pub fn new(chat: Arc<dyn ChatCompletion>, config: GeneratorConfig) -> Self {
        Self { chat, config }
    }

    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build the request for `history`: the persona, then the most recent
    /// `context_turns` turns in order.
    ///
    /// A pinned system turn in the history takes the place of the persona.
    #[must_use]
    pub fn build_request(&self, history: &History) -> ChatRequest {
        let system = history
            .system()
            .cloned()
            .unwrap_or_else(|| ConversationTurn::system(self.config.persona.clone()));

        let messages = std::iter::once(&system)
            .chain(history.recent(self.config.context_turns))
            .map(ChatMessage::from)
            .collect();

        ChatRequest {
            messages,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        }
    }

    /// Request a reply for `history`, whose last turn is the user's input.
    ///
    /// Returns the trimmed reply text or a classified failure.
    pub async fn generate(&self, history: &History) -> Result<String, GenerationError> {
        let request = self.build_request(history);

        let reply = match self.chat.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Response generation failed");
                return Err(e);
            }
        };

        let reply = reply.trim();
        if reply.is_empty() {
            tracing::warn!("Response generation returned an empty reply");
            return Err(GenerationError::EmptyResult);
        }

        tracing::debug!(chars = reply.len(), "Generated reply");
        Ok(reply.to_string())
    }
}
