use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::Settings;

use super::AiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: &'static str,
    pub(crate) content: String,
}

impl ChatMessage {
    pub(crate) fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub(crate) fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChatRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) json_response: bool,
    pub(crate) temperature: f64,
    pub(crate) max_tokens: u32,
}

impl ChatRequest {
    pub(crate) fn user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChatReply {
    pub(crate) content: String,
    pub(crate) model: String,
    pub(crate) tokens_used: Option<u64>,
}

/// Chat-completion style language model endpoint.
#[async_trait]
pub(crate) trait ChatProvider: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, AiError>;
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    model: Option<String>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    total_tokens: Option<u64>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiChatClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.ai().request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build AI provider HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, AiError> {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if request.json_response {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|err| AiError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &raw_body));
        }

        let body: CompletionBody = serde_json::from_str(&raw_body).map_err(|err| {
            AiError::MalformedResponse(format!("provider returned unexpected body: {err}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::MalformedResponse("missing completion content".to_string()))?;

        Ok(ChatReply {
            content,
            model: body.model.unwrap_or(request.model),
            tokens_used: body.usage.and_then(|usage| usage.total_tokens),
        })
    }
}

pub(crate) fn classify_status(status: StatusCode, raw_body: &str) -> AiError {
    let message = extract_error_message(raw_body);
    match status {
        StatusCode::BAD_REQUEST => AiError::ProviderBadRequest(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::ProviderAuth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AiError::Timeout,
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
        other => AiError::ProviderUnavailable { status: other.as_u16(), message },
    }
}

fn extract_error_message(raw_body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(raw_body).unwrap_or(Value::Null);

    parsed
        .get("error")
        .and_then(|error| error.get("message").and_then(Value::as_str).or_else(|| error.as_str()))
        .or_else(|| parsed.get("message").and_then(Value::as_str))
        .map(ToString::to_string)
        .unwrap_or_else(|| raw_body.chars().take(200).collect())
}
