//! OpenRouter chat completions client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const USER_AGENT: &str = concat!("claimguard-agent/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// LLM client errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing API key: set {0} in the environment or .env file")]
    MissingApiKey(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Hosted chat model
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

pub struct OpenRouterClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(API_KEY_ENV));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// First choice's message content
fn parse_answer(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ParseError(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| LlmError::ParseError("response contained no choices".to_string()))
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, messages = messages.len(), "Querying chat model");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Chat model returned an error");
            return Err(LlmError::ApiError(status.as_u16(), body));
        }

        parse_answer(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"C100000 looks suspicious"}}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "C100000 looks suspicious");
    }

    #[test]
    fn test_parse_empty_choices() {
        assert!(matches!(parse_answer(r#"{"choices":[]}"#), Err(LlmError::ParseError(_))));
        assert!(matches!(parse_answer("not json"), Err(LlmError::ParseError(_))));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        assert!(matches!(
            OpenRouterClient::new("  ".to_string(), DEFAULT_MODEL),
            Err(LlmError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let json = serde_json::to_value(ChatRequest {
            model: DEFAULT_MODEL,
            messages: &messages,
        })
        .unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }
}
