//! Transcript message types.

use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Identifier of a message within a transcript.
///
/// Ids are minted by the transcript in creation order and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Create a `MessageId` from its raw sequence number.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the raw sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person typing into the client.
    User,
    /// The question-answering backend.
    Bot,
}

impl Sender {
    /// Short display label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Bot => "SRB",
        }
    }
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id.
    pub id: MessageId,
    /// Text content. Empty for a bot placeholder that has not streamed yet.
    pub content: String,
    /// Author of the message.
    pub sender: Sender,
    /// Local wall-clock time at creation, formatted `HH:MM`.
    pub timestamp: String,
}

impl Message {
    pub(crate) fn new(id: MessageId, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            sender,
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }

    /// Check if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Check if this is a bot message.
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}
