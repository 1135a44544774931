//! Chat completion and reply generation
//!
//! [`ResponseGenerator`] never fails: remote errors become a fixed apology
//! chosen by [`ChatError::fallback_reply`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::Credential;

/// System persona sent ahead of every transcript
pub const PERSONA: &str = "You are a helpful and friendly AI voice assistant.";

/// Output token cap for replies
pub const MAX_REPLY_TOKENS: u32 = 150;

/// Sampling temperature for replies
pub const REPLY_TEMPERATURE: f64 = 0.7;

/// Reply used when the endpoint rejects the API key
pub const AUTH_FALLBACK: &str = "Authentication error. Please check the API key.";

/// Reply used when the endpoint rate-limits the request
pub const RATE_LIMIT_FALLBACK: &str =
    "I'm sorry, but I've reached my rate limit. Please try again later.";

/// Reply used for any other failure
pub const SERVICE_FALLBACK: &str = "I'm sorry, I couldn't process that request.";

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Persona / instructions
    System,
    /// The speaker
    User,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered messages
    pub messages: Vec<ChatMessage>,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature, provider default if `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ChatRequest {
    /// Persona + transcript request for a voice turn
    #[must_use]
    pub fn reply(model: &str, transcript: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: PERSONA.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: transcript.to_string(),
                },
            ],
            max_tokens: MAX_REPLY_TOKENS,
            temperature: Some(REPLY_TEMPERATURE),
        }
    }

    /// Minimal request used to check that a key authenticates
    #[must_use]
    pub fn key_check(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Hello".to_string(),
            }],
            max_tokens: 10,
            temperature: None,
        }
    }
}

/// Chat completion failure kinds
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Key rejected (401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Rate limit or quota exhausted (429)
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Anything else
    #[error("service error: {0}")]
    Service(String),
}

impl ChatError {
    /// In-character reply substituted for the model's answer
    #[must_use]
    pub const fn fallback_reply(&self) -> &'static str {
        match self {
            Self::Auth(_) => AUTH_FALLBACK,
            Self::RateLimit(_) => RATE_LIMIT_FALLBACK,
            Self::Service(_) => SERVICE_FALLBACK,
        }
    }
}

/// Remote chat completion endpoint
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the assistant text
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] classifying the failure
    async fn complete(&self, request: &ChatRequest, credential: &Credential)
    -> Result<String, ChatError>;
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `OpenAI`-compatible chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiChat {
    /// Create a client against `base_url` (e.g. `https://api.openai.com/v1`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(
        &self,
        request: &ChatRequest,
        credential: &Credential,
    ) -> Result<String, ChatError> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(match status.as_u16() {
                401 | 403 => ChatError::Auth(format!("{status}: {body}")),
                429 => ChatError::RateLimit(format!("{status}: {body}")),
                _ => ChatError::Service(format!("{status}: {body}")),
            });
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Service(format!("failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Service("response had no content".to_string()))
    }
}

/// Outcome of [`ResponseGenerator::generate_reply`]
#[derive(Debug)]
pub struct Reply {
    /// Text to show and speak
    pub text: String,
    /// Set when `text` is a fallback apology
    pub degraded: Option<ChatError>,
}

/// Turns a transcript into an assistant reply
pub struct ResponseGenerator {
    model: Box<dyn ChatModel>,
    model_id: String,
}

impl ResponseGenerator {
    /// Create a generator using `model_id` on `model`
    #[must_use]
    pub fn new(model: Box<dyn ChatModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    /// Generate a reply; failures degrade to a fixed apology
    pub async fn generate_reply(&self, transcript: &str, credential: &Credential) -> Reply {
        let request = ChatRequest::reply(&self.model_id, transcript);

        match self.model.complete(&request, credential).await {
            Ok(text) => {
                tracing::info!(chars = text.len(), "reply generated");
                Reply {
                    text: text.trim().to_string(),
                    degraded: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply generation degraded");
                Reply {
                    text: e.fallback_reply().to_string(),
                    degraded: Some(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialSource;

    fn credential() -> Credential {
        Credential::new("sk-test-key", CredentialSource::Environment)
    }

    #[test]
    fn test_reply_request_shape() {
        let request = ChatRequest::reply("gpt-3.5-turbo", "What is 2+2?");

        assert_eq!(request.max_tokens, 150);
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, PERSONA);
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.messages[1].content, "What is 2+2?");
    }

    #[test]
    fn test_key_check_omits_temperature() {
        let json = serde_json::to_value(ChatRequest::key_check("gpt-3.5-turbo")).unwrap();
        assert_eq!(json["max_tokens"], 10);
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_reply_wire_format() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test-key")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": PERSONA},
                    {"role": "user", "content": "What is 2+2?"}
                ],
                "max_tokens": 150,
                "temperature": 0.7
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":" 2+2 is 4. "}}]}"#)
            .create_async()
            .await;

        let generator = ResponseGenerator::new(Box::new(OpenAiChat::new(server.url())), "gpt-3.5-turbo");
        let reply = generator.generate_reply("What is 2+2?", &credential()).await;

        mock.assert_async().await;
        assert_eq!(reply.text, "2+2 is 4.");
        assert!(reply.degraded.is_none());
    }

    async fn reply_for_status(status: usize) -> Reply {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_body(r#"{"error":{"message":"nope"}}"#)
            .create_async()
            .await;

        let generator = ResponseGenerator::new(Box::new(OpenAiChat::new(server.url())), "gpt-3.5-turbo");
        generator.generate_reply("hello", &credential()).await
    }

    #[tokio::test]
    async fn test_auth_failure_fallback() {
        let reply = reply_for_status(401).await;
        assert_eq!(reply.text, "Authentication error. Please check the API key.");
        assert!(matches!(reply.degraded, Some(ChatError::Auth(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_fallback() {
        let reply = reply_for_status(429).await;
        assert_eq!(
            reply.text,
            "I'm sorry, but I've reached my rate limit. Please try again later."
        );
        assert!(matches!(reply.degraded, Some(ChatError::RateLimit(_))));
    }

    #[tokio::test]
    async fn test_service_failure_fallback() {
        let reply = reply_for_status(503).await;
        assert_eq!(reply.text, "I'm sorry, I couldn't process that request.");
        assert!(matches!(reply.degraded, Some(ChatError::Service(_))));
    }

    #[tokio::test]
    async fn test_missing_content_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let chat = OpenAiChat::new(server.url());
        let err = chat
            .complete(&ChatRequest::key_check("gpt-3.5-turbo"), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Service(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades() {
        // Port 9 (discard) on localhost is not an HTTP server
        let generator =
            ResponseGenerator::new(Box::new(OpenAiChat::new("http://127.0.0.1:9")), "gpt-3.5-turbo");
        let reply = generator.generate_reply("hello", &credential()).await;
        assert_eq!(reply.text, SERVICE_FALLBACK);
    }
}
