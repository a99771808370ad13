//! Remote AI API Client
//!
//! Stateless request/response wrapper around the AI backend's HTTP API:
//!
//! | operation        | endpoint          | success field     |
//! |------------------|-------------------|-------------------|
//! | chat / think     | `POST /api/chat`  | `response`        |
//! | generate_code    | `POST /api/code`  | `code`            |
//! | translate        | `POST /api/translate` | `translated_text` |
//! | generate_image   | `POST /api/image` | `image_url`       |
//! | generate_video   | `POST /api/video` | `video_url`       |
//! | health           | `GET /health`     | HTTP 200          |
//!
//! Every payload may instead carry `{"error": "..."}`. Each call has its own
//! timeout; nothing is retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Failure of a remote call
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Upstream(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Timeouts per call class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiTimeouts {
    pub health: Duration,
    pub standard: Duration,
    pub thinking: Duration,
    pub generation: Duration,
}

impl Default for AiTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            standard: Duration::from_secs(30),
            thinking: Duration::from_secs(120),
            generation: Duration::from_secs(180),
        }
    }
}

/// Operations the dispatcher needs from the AI backend
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Quick chat reply
    async fn chat(&self, message: &str, context: &str) -> Result<String, AiError>;

    /// Long-form reasoning reply
    async fn think(&self, message: &str, context: &str) -> Result<String, AiError>;

    async fn generate_code(&self, description: &str, language: &str) -> Result<String, AiError>;

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError>;

    /// Returns the image URL
    async fn generate_image(&self, prompt: &str, style: &str) -> Result<String, AiError>;

    /// Returns the video URL
    async fn generate_video(
        &self,
        description: &str,
        duration_secs: u32,
    ) -> Result<String, AiError>;

    async fn health(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    model: &'a str,
    max_tokens: usize,
    mode: &'a str,
}

#[derive(Debug, Serialize)]
struct CodeRequest<'a> {
    description: &'a str,
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    style: &'a str,
    size: &'a str,
}

#[derive(Debug, Serialize)]
struct VideoRequest<'a> {
    description: &'a str,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct CodeResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    video_url: String,
}

/// HTTP client for the AI backend
#[derive(Clone)]
pub struct RemoteAiClient {
    client: Client,
    base_url: String,
    model: String,
    timeouts: AiTimeouts,
}

impl RemoteAiClient {
    pub fn new(base_url: &str, model: &str, timeouts: AiTimeouts) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeouts,
        }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(&config.ai_api_url, &config.ai_model, config.ai_timeouts)
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B, timeout: Duration) -> Result<T, AiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {} (timeout {}s)", url, timeout.as_secs());

        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        decode(status.as_u16(), status.is_success(), &text)
    }

    async fn chat_with_mode(
        &self,
        message: &str,
        context: &str,
        mode: &str,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            message,
            context: (!context.is_empty()).then_some(context),
            model: &self.model,
            max_tokens,
            mode,
        };
        let reply: ChatResponse = self.post("/api/chat", &request, timeout).await?;
        Ok(reply.response)
    }
}

#[async_trait]
impl AiBackend for RemoteAiClient {
    async fn chat(&self, message: &str, context: &str) -> Result<String, AiError> {
        self.chat_with_mode(message, context, "quick", 500, self.timeouts.standard)
            .await
    }

    async fn think(&self, message: &str, context: &str) -> Result<String, AiError> {
        self.chat_with_mode(message, context, "deep", 2000, self.timeouts.thinking)
            .await
    }

    async fn generate_code(&self, description: &str, language: &str) -> Result<String, AiError> {
        let request = CodeRequest { description, language };
        let reply: CodeResponse = self.post("/api/code", &request, self.timeouts.standard).await?;
        Ok(reply.code)
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        let request = TranslateRequest { text, target_language };
        let reply: TranslateResponse = self
            .post("/api/translate", &request, self.timeouts.standard)
            .await?;
        Ok(reply.translated_text)
    }

    async fn generate_image(&self, prompt: &str, style: &str) -> Result<String, AiError> {
        let request = ImageRequest {
            prompt,
            style,
            size: "1024x1024",
        };
        let reply: ImageResponse = self
            .post("/api/image", &request, self.timeouts.generation)
            .await?;
        Ok(reply.image_url)
    }

    async fn generate_video(
        &self,
        description: &str,
        duration_secs: u32,
    ) -> Result<String, AiError> {
        let request = VideoRequest {
            description,
            duration: duration_secs,
        };
        let reply: VideoResponse = self
            .post("/api/video", &request, self.timeouts.generation)
            .await?;
        Ok(reply.video_url)
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(self.timeouts.health).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(timeout.as_secs())
    } else {
        AiError::Network(e.to_string())
    }
}

/// Turn a raw response into a typed payload or an error.
///
/// An `error` field wins over everything else; non-2xx without one carries the body.
fn decode<T: DeserializeOwned>(status: u16, success: bool, body: &str) -> Result<T, AiError> {
    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let upstream = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .filter(|e| !e.is_null())
        .map(|e| match e.as_str() {
            Some(s) => s.to_string(),
            None => e.to_string(),
        });

    if !success {
        let message = upstream.unwrap_or_else(|| truncate(body, 200));
        return Err(AiError::Status { status, message });
    }
    if let Some(message) = upstream {
        return Err(AiError::Upstream(message));
    }

    let value = value.ok_or_else(|| AiError::Malformed(truncate(body, 200)))?;
    serde_json::from_value(value).map_err(|e| AiError::Malformed(e.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
