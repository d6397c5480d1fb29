//! HTTP client for the question-answering backend.
//!
//! The `ChatBackend` trait is the seam between the turn consumer and the
//! network; `HttpBackend` is the reqwest implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::{Result, TransportError};

/// Response body as a sequence of raw reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Request body for both chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question.
    pub message: String,
}

/// Response from the non-streaming chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Full answer text.
    pub response: String,
    /// Backend status string, "success" on the happy path.
    #[serde(default)]
    pub status: String,
}

/// Response from the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy".
    pub status: String,
    /// Whether the retrieval index and models are loaded.
    #[serde(default)]
    pub models_loaded: bool,
}

impl HealthStatus {
    /// Check if the backend can answer questions.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == "healthy" && self.models_loaded
    }
}

/// Error body returned by the backend on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    detail: String,
}

/// Source of streamed replies.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one question and return the reply body as raw reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not a success.
    async fn open_stream(&self, message: &str) -> Result<ByteStream>;

    /// Human-readable location of the backend, used in failure notices.
    fn location(&self) -> &str;
}

/// reqwest implementation of [`ChatBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ChatConfig,
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// No overall request timeout is set because replies stream for as long
    /// as the model keeps generating.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no http(s) scheme or the HTTP client
    /// cannot be built.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let base = config.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(config.backend_url.clone()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self { client, config })
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    fn stream_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Handle API error responses.
    async fn handle_error(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(err) => err.detail,
            Err(_) => "Unknown error".to_string(),
        };
        TransportError::Status { status, message }
    }

    /// Query the health endpoint.
    ///
    /// Bounded by the configured health timeout, so a backend that accepts
    /// the connection but never answers still yields an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with a
    /// non-success status.
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(self.config.health_url())
            .timeout(self.config.health_timeout())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }

    /// Ask a question through the non-streaming endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success, or
    /// the body is not a chat response.
    pub async fn ask(&self, message: &str) -> Result<ChatResponse> {
        let request = ChatRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(self.config.chat_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_stream(&self, message: &str) -> Result<ByteStream> {
        let url = self.config.stream_url();
        let request = ChatRequest {
            message: message.to_string(),
        };

        tracing::debug!(url = %url, len = message.len(), "Opening reply stream");

        let response = self
            .client
            .post(&url)
            .headers(Self::stream_headers())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let body = response
            .bytes_stream()
            .map(|read| read.map(|bytes| bytes.to_vec()).map_err(TransportError::from));

        Ok(Box::pin(body))
    }

    fn location(&self) -> &str {
        self.base_url()
    }
}
