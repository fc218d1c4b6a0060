//! Chat-completion provider
//!
//! Sends one OpenAI-style chat completion per turn to the configured endpoint
//! (Perplexity by default). The user's credential travels only as the bearer
//! header of that request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::conversation::Category;

use super::{Credential, ProviderError, ResponseProvider, TipRequest, APOLOGY, MISSING_CREDENTIAL};

pub const SYSTEM_PROMPT: &str = "You are a wellness assistant focused on fitness, nutrition, and mental health. Keep responses concise and practical.";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response. The API may report an `error` with any status.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Full URL of the completions endpoint
    pub endpoint: String,
    pub model: String,
    /// `None` leaves the transport default in place
    pub timeout: Option<Duration>,
}

impl From<&Config> for RemoteConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.remote_endpoint.clone(),
            model: config.remote_model.clone(),
            timeout: config.remote_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub struct RemoteProvider {
    config: RemoteConfig,
    client: Client,
}

impl RemoteProvider {
    pub fn new(config: RemoteConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { config, client })
    }

    /// Send one completion request and return the reply text
    pub async fn complete(
        &self,
        credential: &Credential,
        text: &str,
        category: Option<Category>,
    ) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new("user", build_prompt(text, category)),
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let completion = match serde_json::from_str::<ChatCompletionResponse>(&body) {
            Ok(completion) => completion,
            Err(e) if status.is_success() => {
                return Err(ProviderError::InvalidResponse(format!(
                    "Failed to parse response: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(ProviderError::InvalidResponse(format!("HTTP {}: {}", status, body)));
            }
        };

        if let Some(error) = completion.error {
            return Err(ProviderError::Api(error.message));
        }

        if !status.is_success() {
            return Err(ProviderError::InvalidResponse(format!("HTTP {}", status)));
        }

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))
    }
}

#[async_trait]
impl ResponseProvider for RemoteProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn wants_credential(&self) -> bool {
        true
    }

    async fn respond(&self, request: &TipRequest) -> String {
        let Some(credential) = &request.credential else {
            return MISSING_CREDENTIAL.to_string();
        };

        match self.complete(credential, &request.text, request.category).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Completion request failed: {}", e);
                APOLOGY.to_string()
            }
        }
    }
}

/// The user prompt sent alongside the system instruction
pub fn build_prompt(text: &str, category: Option<Category>) -> String {
    match category {
        Some(category) => format!(
            "As a wellness assistant, provide a helpful tip about {} in response to: {}",
            category, text
        ),
        None => format!(
            "As a wellness assistant, provide a helpful response to: {}",
            text
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::providers::testing::{unreachable_endpoint, CompletionServer};

    fn request(credential: Option<&str>) -> TipRequest {
        TipRequest {
            text: "I need a workout plan".into(),
            category: Some(Category::Fitness),
            credential: credential.and_then(Credential::new),
        }
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(
            build_prompt("help me sleep", Some(Category::Mental)),
            "As a wellness assistant, provide a helpful tip about mental in response to: help me sleep"
        );
        assert_eq!(
            build_prompt("hello", None),
            "As a wellness assistant, provide a helpful response to: hello"
        );
    }

    #[tokio::test]
    async fn test_missing_credential_skips_network() {
        let server = CompletionServer::reply_content("unused").await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();

        assert_eq!(provider.respond(&request(None)).await, MISSING_CREDENTIAL);
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn test_success_sends_expected_request() {
        let server = CompletionServer::reply_content("  Do 3 sets of squats.  ").await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();

        let reply = provider.respond(&request(Some("pplx-123"))).await;
        assert_eq!(reply, "  Do 3 sets of squats.  ");

        let seen = server.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer pplx-123"));

        let body = &seen[0].body;
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 150);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "As a wellness assistant, provide a helpful tip about fitness in response to: I need a workout plan"
        );
    }

    #[tokio::test]
    async fn test_api_error_payload_falls_back() {
        let server = CompletionServer::start(
            StatusCode::UNAUTHORIZED,
            json!({ "error": { "message": "Invalid API key" } }).to_string(),
        )
        .await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();

        let err = provider
            .complete(&Credential::new("bad").unwrap(), "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api(ref m) if m == "Invalid API key"));

        assert_eq!(provider.respond(&request(Some("bad"))).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_error_payload_with_ok_status_falls_back() {
        let server = CompletionServer::start(
            StatusCode::OK,
            json!({ "error": { "message": "quota exceeded" } }).to_string(),
        )
        .await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();

        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_malformed_payload_falls_back() {
        let server = CompletionServer::start(StatusCode::OK, "not json".to_string()).await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();
        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);

        let server = CompletionServer::start(StatusCode::OK, json!({ "choices": [] }).to_string()).await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();
        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);

        let server = CompletionServer::reply_content(" \n ").await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();
        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_server_error_status_falls_back() {
        let server =
            CompletionServer::start(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>".to_string()).await;
        let provider = RemoteProvider::new(server.remote_config()).unwrap();
        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let provider = RemoteProvider::new(RemoteConfig {
            endpoint: unreachable_endpoint().await,
            model: "test-model".into(),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();

        assert_eq!(provider.respond(&request(Some("key"))).await, APOLOGY);
    }
}
