//! OpenAI-compatible chat-completions client.
//!
//! Every failure is classified into a [`GenerationError`] before it leaves
//! this module:
//!
//! | Failure | Kind |
//! |---|---|
//! | connect error, timeout, non-2xx status | `Network` |
//! | body is not JSON or lacks `choices[0].message.content` | `Schema` |
//! | content is null or blank | `EmptyResult` |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use voxagent_core::{ChatCompletion, ChatRequest, GenerationError, LlmSettings};

/// Connection settings for [`ChatCompletionsClient`].
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl From<&LlmSettings> for LlmClientConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout(),
        }
    }
}

/// Client for `POST {base_url}/chat/completions`.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: LlmClientConfig,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, GenerationError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(describe(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(describe(&e)))?;

        if !status.is_success() {
            return Err(GenerationError::Network(format!(
                "service returned {status}: {}",
                body.trim()
            )));
        }
        Ok(body)
    }

    /// List the model ids the service offers (`GET {base_url}/models`).
    ///
    /// Used to verify connectivity and credentials.
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let body = self.send(self.client.get(self.url("models"))).await?;
        parse_models(&body)
    }
}

#[async_trait]
impl ChatCompletion for ChatCompletionsClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );
        let body = self
            .send(self.client.post(self.url("chat/completions")).json(request))
            .await?;
        parse_completion(&body)
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("could not connect: {err}")
    } else {
        err.to_string()
    }
}

/// Extract the trimmed reply text from a chat-completions response body.
pub fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerationError::Schema(e.to_string()))?;

    let content = value
        .pointer("/choices/0/message/content")
        .ok_or_else(|| GenerationError::Schema("missing choices[0].message.content".into()))?;

    let text = match content {
        serde_json::Value::Null => return Err(GenerationError::EmptyResult),
        serde_json::Value::String(text) => text.trim(),
        other => {
            return Err(GenerationError::Schema(format!(
                "message content is not a string: {other}"
            )));
        }
    };

    if text.is_empty() {
        return Err(GenerationError::EmptyResult);
    }
    Ok(text.to_string())
}

fn parse_models(body: &str) -> Result<Vec<String>, GenerationError> {
    let list: ModelList =
        serde_json::from_str(body).map_err(|e| GenerationError::Schema(e.to_string()))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}
