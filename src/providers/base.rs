//! Base types shared by the completion provider, the prompt builder and
//! session storage.

use crate::error::{Result, StickllmError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the person at the terminal
    User,
    /// Text generated by the completion server
    Assistant,
}

impl Role {
    /// Lowercase name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Speaker label used inside prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StickllmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(StickllmError::Storage(format!("Unknown message role: {}", other))),
        }
    }
}

/// One entry of a conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use stickllm::providers::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A finite, non-restartable sequence of generated text fragments
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Outcome of a bounded health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Whether any probe succeeded
    pub healthy: bool,
    /// Number of probes issued
    pub attempts: u32,
    /// Number of fixed waits slept between probes
    pub waits: u32,
}

/// A remote text-completion endpoint
///
/// Implementations wrap transport failures into [`StickllmError::Network`]
/// so callers never handle client-library error types.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Probe the server up to `retries` times with a fixed `wait` between
    /// failed attempts
    async fn probe_health(&self, retries: u32, wait: Duration) -> HealthReport;

    /// Start a streaming completion for `prompt`
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the server rejects it
    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream>;

    /// Request a completion for `prompt` as a single response body
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body has no `content`
    async fn complete_once(&self, prompt: &str) -> Result<String>;

    /// Liveness check; true on the first successful probe
    async fn health_check(&self, retries: u32, wait: Duration) -> bool {
        self.probe_health(retries, wait).await.healthy
    }
}
