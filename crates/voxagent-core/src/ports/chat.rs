//! Chat-completion port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ConversationTurn, Role};
use crate::error::GenerationError;

/// A chat message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// A non-streaming chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Backend-agnostic chat-completion service.
///
/// Implementations return the raw reply text of the first choice, or a
/// classified [`GenerationError`]. They must never panic on malformed
/// responses.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError>;
}
