//! Streaming turn consumer.
//!
//! Turns one question into an ordered stream of [`TurnEvent`]s: zero or more
//! chunks followed by exactly one terminal event. The stream owns the network
//! body, so it can be polled inline or moved onto its own task.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::backend::{ByteStream, ChatBackend};
use crate::error::TurnFailure;
use crate::frame::{Frame, FrameAction, FrameDecoder};

/// How a successful turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The backend sent `done: true`.
    DoneSignal,
    /// The body ended without a terminal frame.
    StreamClosed,
}

/// One step of a streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Text to append to the reply.
    Chunk(String),
    /// Turn finished successfully.
    Completed(Completion),
    /// Turn finished on the error path.
    Failed(TurnFailure),
}

impl TurnEvent {
    /// Check if this event ends the turn.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }
}

enum State {
    Connect {
        backend: Arc<dyn ChatBackend>,
        message: String,
    },
    Read {
        body: ByteStream,
        decoder: FrameDecoder,
        ready: VecDeque<Frame>,
        closed: bool,
    },
    Finished,
}

/// Send `message` to `backend` and stream the reply as events.
///
/// The returned stream always ends with exactly one terminal event. With
/// `idle_timeout` set, a read that takes longer fails the turn; without it
/// a silent backend keeps the turn open indefinitely.
pub fn turn_events(
    backend: Arc<dyn ChatBackend>,
    message: String,
    idle_timeout: Option<Duration>,
) -> BoxStream<'static, TurnEvent> {
    stream::unfold(State::Connect { backend, message }, move |state| {
        advance(state, idle_timeout)
    })
    .boxed()
}

async fn advance(mut state: State, idle_timeout: Option<Duration>) -> Option<(TurnEvent, State)> {
    loop {
        state = match state {
            State::Finished => return None,
            State::Connect { backend, message } => match backend.open_stream(&message).await {
                Ok(body) => State::Read {
                    body,
                    decoder: FrameDecoder::new(),
                    ready: VecDeque::new(),
                    closed: false,
                },
                Err(e) => {
                    tracing::warn!(error = %e, backend = %backend.location(), "Failed to open reply stream");
                    return Some((TurnEvent::Failed(e.into()), State::Finished));
                }
            },
            State::Read {
                mut body,
                mut decoder,
                mut ready,
                closed,
            } => {
                if let Some(frame) = ready.pop_front() {
                    match frame.action() {
                        FrameAction::Chunk(text) => {
                            let next = State::Read {
                                body,
                                decoder,
                                ready,
                                closed,
                            };
                            return Some((TurnEvent::Chunk(text), next));
                        }
                        FrameAction::Done => {
                            tracing::debug!("Reply complete");
                            return Some((
                                TurnEvent::Completed(Completion::DoneSignal),
                                State::Finished,
                            ));
                        }
                        FrameAction::Error(message) => {
                            tracing::warn!(error = %message, "Backend reported an error");
                            return Some((
                                TurnEvent::Failed(TurnFailure::Backend(message)),
                                State::Finished,
                            ));
                        }
                        FrameAction::Ignore => State::Read {
                            body,
                            decoder,
                            ready,
                            closed,
                        },
                    }
                } else if closed {
                    tracing::debug!("Reply stream closed without a done frame");
                    return Some((
                        TurnEvent::Completed(Completion::StreamClosed),
                        State::Finished,
                    ));
                } else {
                    match next_read(&mut body, idle_timeout).await {
                        Ok(Some(bytes)) => {
                            ready.extend(decoder.push(&bytes));
                            State::Read {
                                body,
                                decoder,
                                ready,
                                closed: false,
                            }
                        }
                        Ok(None) => {
                            ready.extend(decoder.finish());
                            State::Read {
                                body,
                                decoder,
                                ready,
                                closed: true,
                            }
                        }
                        Err(failure) => {
                            tracing::warn!(error = %failure, "Reply stream failed");
                            return Some((TurnEvent::Failed(failure), State::Finished));
                        }
                    }
                }
            }
        };
    }
}

async fn next_read(
    body: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, TurnFailure> {
    let read = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, body.next())
            .await
            .map_err(|_| TurnFailure::IdleTimeout(limit))?,
        None => body.next().await,
    };
    read.transpose().map_err(TurnFailure::from)
}
