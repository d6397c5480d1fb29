//! Client configuration.
//!
//! Defaults match the stock SRB backend running on the local machine.

use std::time::Duration;

use serde::Deserialize;

/// Default welcome message shown in a fresh transcript.
pub const DEFAULT_WELCOME: &str = "Hello! I'm your SRB AI Assistant. I can help you find \
information from the Student Resource Book (SRB). Ask me anything about academic policies, \
procedures, attendance requirements, examination rules, and more!";

/// Configuration for a chat session and its backend client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Backend base URL (e.g., "http://localhost:7860").
    #[serde(default = "ChatConfig::default_backend_url")]
    pub backend_url: String,

    /// Path of the streaming chat endpoint.
    #[serde(default = "ChatConfig::default_stream_path")]
    pub stream_path: String,

    /// Path of the non-streaming chat endpoint.
    #[serde(default = "ChatConfig::default_chat_path")]
    pub chat_path: String,

    /// Path of the health endpoint.
    #[serde(default = "ChatConfig::default_health_path")]
    pub health_path: String,

    /// TCP connect timeout in seconds.
    #[serde(default = "ChatConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Whole-request timeout for health checks, in seconds.
    #[serde(default = "ChatConfig::default_health_timeout")]
    pub health_timeout_seconds: u64,

    /// Maximum wait for the next body read, in seconds. `None` waits forever.
    #[serde(default)]
    pub idle_timeout_seconds: Option<u64>,

    /// Content of the welcome message.
    #[serde(default = "ChatConfig::default_welcome_message")]
    pub welcome_message: String,

    /// Example questions offered on an empty conversation.
    #[serde(default = "ChatConfig::default_example_questions")]
    pub example_questions: Vec<String>,
}

impl ChatConfig {
    fn default_backend_url() -> String {
        "http://localhost:7860".to_string()
    }

    fn default_stream_path() -> String {
        "/chat/stream".to_string()
    }

    fn default_chat_path() -> String {
        "/chat".to_string()
    }

    fn default_health_path() -> String {
        "/health".to_string()
    }

    const fn default_connect_timeout() -> u64 {
        10
    }

    const fn default_health_timeout() -> u64 {
        5
    }

    fn default_welcome_message() -> String {
        DEFAULT_WELCOME.to_string()
    }

    fn default_example_questions() -> Vec<String> {
        [
            "Explain the attendance rules.",
            "What are the medical leave policies?",
            "Summarize the grading and evaluation criteria.",
            "What are the library borrowing limits?",
            "What happens if I use unfair means in an exam?",
            "Tell me about examination rules and procedures.",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Create a config pointing at the given backend, other fields defaulted.
    #[must_use]
    pub fn with_backend(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Self::default()
        }
    }

    /// Backend base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    /// Full URL of the streaming endpoint.
    #[must_use]
    pub fn stream_url(&self) -> String {
        join_url(self.base_url(), &self.stream_path)
    }

    /// Full URL of the non-streaming endpoint.
    #[must_use]
    pub fn chat_url(&self) -> String {
        join_url(self.base_url(), &self.chat_path)
    }

    /// Full URL of the health endpoint.
    #[must_use]
    pub fn health_url(&self) -> String {
        join_url(self.base_url(), &self.health_path)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the idle timeout as a `Duration`, if one is configured.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_seconds.map(Duration::from_secs)
    }

    /// Get the health check timeout as a `Duration`.
    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }

    /// The notice shown in place of a failed reply, naming this backend.
    #[must_use]
    pub fn failure_notice(&self) -> String {
        Self::failure_notice_for(self.base_url())
    }

    /// The notice shown in place of a failed reply, naming `location`.
    #[must_use]
    pub fn failure_notice_for(location: &str) -> String {
        format!(
            "Sorry, I encountered an error while processing your question. \
             Please make sure the backend server is running on {location}"
        )
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend_url: Self::default_backend_url(),
            stream_path: Self::default_stream_path(),
            chat_path: Self::default_chat_path(),
            health_path: Self::default_health_path(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            health_timeout_seconds: Self::default_health_timeout(),
            idle_timeout_seconds: None,
            welcome_message: Self::default_welcome_message(),
            example_questions: Self::default_example_questions(),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
