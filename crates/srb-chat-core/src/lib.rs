//! Core logic for the SRB chat client.
//!
//! This crate provides everything below the user interface:
//!
//! - **Transcript**: the ordered message list and its id scheme
//! - **Frames**: incremental decoding of `data: {json}` event lines
//! - **Backend**: the `ChatBackend` seam and its reqwest implementation
//! - **Consumer**: one question in, a stream of turn events out
//! - **Session**: transcript plus busy/pending state, notifications and
//!   change tracking
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use srb_chat_core::{ChatConfig, ChatSession, HttpBackend, TurnOutcome};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChatConfig::default();
//! let backend = Arc::new(HttpBackend::new(config.clone())?);
//! let mut session = ChatSession::new(config);
//!
//! if let Ok(TurnOutcome::Completed { content, .. }) =
//!     session.submit(backend, "Explain the attendance rules.").await
//! {
//!     println!("{content}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod config;
pub mod consumer;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;
pub mod transcript;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use backend::{ByteStream, ChatBackend, ChatResponse, HealthStatus, HttpBackend};
pub use config::ChatConfig;
pub use consumer::{turn_events, Completion, TurnEvent};
pub use error::{Result, SubmitRejected, TransportError, TurnFailure};
pub use frame::{Frame, FrameAction, FrameDecoder};
pub use message::{Message, MessageId, Sender};
pub use session::{ChatSession, Notification, NotificationLevel, TurnOutcome, TurnTicket};
pub use transcript::Transcript;
