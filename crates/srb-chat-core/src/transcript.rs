//! Ordered transcript store.
//!
//! The transcript is append-only. The only in-place mutation is replacing the
//! content of an existing message, which the session uses to patch the bot
//! placeholder while a reply streams in.

use crate::message::{Message, MessageId, Sender};

/// Ordered list of messages in one conversation.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
    welcome: String,
}

impl Transcript {
    /// Create a transcript holding only the welcome message.
    #[must_use]
    pub fn new(welcome: impl Into<String>) -> Self {
        let mut transcript = Self {
            messages: Vec::new(),
            next_id: 0,
            welcome: welcome.into(),
        };
        transcript.reset();
        transcript
    }

    fn mint_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::from_raw(self.next_id)
    }

    /// Append a new message and return its id.
    pub fn append(&mut self, sender: Sender, content: impl Into<String>) -> MessageId {
        let id = self.mint_id();
        self.messages.push(Message::new(id, sender, content));
        id
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        self.append(Sender::User, content)
    }

    /// Append a bot message.
    pub fn push_bot(&mut self, content: impl Into<String>) -> MessageId {
        self.append(Sender::Bot, content)
    }

    /// Replace the content of the message with `id`.
    ///
    /// Returns `false` if no such message exists. Every other field and every
    /// other message is left untouched.
    pub fn replace_content(&mut self, id: MessageId, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().rev().find(|m| m.id == id) {
            Some(msg) => {
                msg.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Discard everything and start over with a fresh welcome message.
    pub fn reset(&mut self) {
        self.messages.clear();
        let welcome = self.welcome.clone();
        self.push_bot(welcome);
    }

    /// All messages in creation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`: a transcript holds at least the welcome message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether only the welcome message is present.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.messages.len() == 1
    }
}
