//! Scripted backend for tests.
//!
//! Available with the `test-utils` feature.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use crate::backend::{ByteStream, ChatBackend};
use crate::error::{Result, TransportError};

#[derive(Debug, Clone)]
enum Script {
    Reads {
        reads: Vec<Vec<u8>>,
        tail: Tail,
    },
    Status(u16),
}

#[derive(Debug, Clone)]
enum Tail {
    Close,
    Fail(String),
    Hang,
}

/// A [`ChatBackend`] that replays a fixed sequence of body reads.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Script,
    location: String,
    received: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            location: "http://localhost:7860".to_string(),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Deliver each line, newline-terminated, as its own read.
    #[must_use]
    pub fn lines(lines: &[&str]) -> Self {
        Self::reads(lines.iter().map(|l| format!("{l}\n\n").into_bytes()).collect())
    }

    /// Deliver the given reads verbatim, then close the body.
    #[must_use]
    pub fn reads(reads: Vec<Vec<u8>>) -> Self {
        Self::new(Script::Reads {
            reads,
            tail: Tail::Close,
        })
    }

    /// Deliver the given reads, then fail the body with a transport error.
    #[must_use]
    pub fn failing_after(reads: Vec<Vec<u8>>, error: impl Into<String>) -> Self {
        Self::new(Script::Reads {
            reads,
            tail: Tail::Fail(error.into()),
        })
    }

    /// Deliver the given reads, then never produce another one.
    #[must_use]
    pub fn hanging_after(reads: Vec<Vec<u8>>) -> Self {
        Self::new(Script::Reads {
            reads,
            tail: Tail::Hang,
        })
    }

    /// Refuse every request with the given HTTP status.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::new(Script::Status(status))
    }

    /// Report `location` as this backend's address.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Messages received so far, in order.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, message: &str) -> Result<ByteStream> {
        self.received.lock().push(message.to_string());

        match &self.script {
            Script::Status(status) => Err(TransportError::Status {
                status: *status,
                message: "scripted failure".to_string(),
            }),
            Script::Reads { reads, tail } => {
                let head = stream::iter(reads.clone().into_iter().map(Ok));
                let body: ByteStream = match tail {
                    Tail::Close => Box::pin(head),
                    Tail::Fail(error) => {
                        let error = TransportError::Parse(error.clone());
                        Box::pin(head.chain(stream::once(async move { Err(error) })))
                    }
                    Tail::Hang => Box::pin(head.chain(stream::pending())),
                };
                Ok(body)
            }
        }
    }

    fn location(&self) -> &str {
        &self.location
    }
}
