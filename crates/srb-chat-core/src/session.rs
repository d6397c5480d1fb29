//! Chat session state.
//!
//! A `ChatSession` owns the transcript and drives at most one streaming turn
//! at a time. Callers either let [`ChatSession::submit`] run a whole turn
//! inline, or call [`ChatSession::begin_turn`], poll
//! [`turn_events`](crate::consumer::turn_events) elsewhere, and feed each
//! event back through [`ChatSession::apply`].
//!
//! Every mutation bumps a revision counter published on a `watch` channel so
//! renderers can redraw after each change.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

use crate::backend::ChatBackend;
use crate::config::ChatConfig;
use crate::consumer::{turn_events, Completion, TurnEvent};
use crate::error::{SubmitRejected, TurnFailure};
use crate::message::{Message, MessageId};
use crate::transcript::Transcript;

/// Toast title for a failed turn.
pub const CONNECTION_ERROR_TITLE: &str = "Connection Error";
/// Toast body for a failed turn.
pub const CONNECTION_ERROR_DESCRIPTION: &str =
    "Unable to connect to the chatbot service. Please try again later.";
/// Toast title after clearing the chat.
pub const CLEARED_TITLE: &str = "Chat cleared";
/// Toast body after clearing the chat.
pub const CLEARED_DESCRIPTION: &str = "Your conversation has been reset.";

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something went wrong.
    Error,
}

/// Transient out-of-band notice, shown outside the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Short title.
    pub title: String,
    /// One-line description.
    pub description: String,
}

impl Notification {
    fn new(level: NotificationLevel, title: &str, description: &str) -> Self {
        Self {
            level,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Handle for a turn started with [`ChatSession::begin_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    /// Trimmed text to send to the backend.
    pub message: String,
    /// Id of the user message.
    pub user_id: MessageId,
    /// Id of the bot placeholder; also identifies the turn.
    pub bot_id: MessageId,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply finished; `content` is the full accumulated text.
    Completed {
        /// Final reply text.
        content: String,
        /// How the stream ended.
        completion: Completion,
    },
    /// Reply failed; the placeholder now holds the failure notice.
    Failed(TurnFailure),
}

#[derive(Debug)]
struct ActiveTurn {
    bot_id: MessageId,
    accumulator: String,
}

/// Transcript plus the state of the in-flight turn.
#[derive(Debug)]
pub struct ChatSession {
    config: ChatConfig,
    location: String,
    transcript: Transcript,
    active: Option<ActiveTurn>,
    pending: bool,
    notifications: VecDeque<Notification>,
    revision: watch::Sender<u64>,
}

impl ChatSession {
    /// Create a session holding only the welcome message.
    #[must_use]
    pub fn new(config: ChatConfig) -> Self {
        let transcript = Transcript::new(config.welcome_message.clone());
        let (revision, _) = watch::channel(0);
        let location = config.base_url().to_string();
        Self {
            config,
            location,
            transcript,
            active: None,
            pending: false,
            notifications: VecDeque::new(),
            revision,
        }
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Backend location named in failure notices.
    #[must_use]
    pub fn backend_location(&self) -> &str {
        &self.location
    }

    /// Name `location` in failure notices from now on.
    ///
    /// Defaults to the configured backend URL; [`ChatSession::submit`]
    /// updates it from the backend it is given.
    pub fn set_backend_location(&mut self, location: &str) {
        if self.location != location {
            self.location = location.to_string();
        }
    }

    /// The notice that replaces a failed reply.
    #[must_use]
    pub fn failure_notice(&self) -> String {
        ChatConfig::failure_notice_for(&self.location)
    }

    /// The transcript.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// Whether a turn is in flight. New submissions are refused while busy.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Whether the typing indicator should show.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Id of the placeholder being streamed into, if any.
    #[must_use]
    pub fn active_turn(&self) -> Option<MessageId> {
        self.active.as_ref().map(|t| t.bot_id)
    }

    /// Whether example questions should be offered.
    #[must_use]
    pub fn shows_examples(&self) -> bool {
        self.transcript.is_fresh() && !self.pending
    }

    /// Subscribe to change notifications.
    ///
    /// The value is a revision counter; only its changes are meaningful.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn touch(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }

    /// Drain queued notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    /// Start a turn: append the user message and an empty bot placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejected::Empty`] for blank text and
    /// [`SubmitRejected::Busy`] while another turn is in flight. Nothing is
    /// appended in either case.
    pub fn begin_turn(&mut self, text: &str) -> Result<TurnTicket, SubmitRejected> {
        let message = text.trim();
        if message.is_empty() {
            tracing::debug!("Ignoring empty submission");
            return Err(SubmitRejected::Empty);
        }
        if self.is_busy() {
            tracing::debug!("Ignoring submission while a reply is streaming");
            return Err(SubmitRejected::Busy);
        }

        let user_id = self.transcript.push_user(message);
        let bot_id = self.transcript.push_bot(String::new());
        self.active = Some(ActiveTurn {
            bot_id,
            accumulator: String::new(),
        });
        self.pending = true;
        self.touch();

        tracing::info!(bot_id = %bot_id, len = message.len(), "Turn started");

        Ok(TurnTicket {
            message: message.to_string(),
            user_id,
            bot_id,
        })
    }

    /// Fold one event of the turn identified by `turn` into the session.
    ///
    /// Events for any turn other than the active one are dropped, which
    /// covers stragglers from a turn that was cleared away. Returns the
    /// outcome when the event ends the turn.
    pub fn apply(&mut self, turn: MessageId, event: TurnEvent) -> Option<TurnOutcome> {
        let Some(active) = self.active.as_mut().filter(|a| a.bot_id == turn) else {
            tracing::debug!(turn = %turn, "Dropping event for inactive turn");
            return None;
        };

        match event {
            TurnEvent::Chunk(text) => {
                active.accumulator.push_str(&text);
                let content = active.accumulator.clone();
                self.transcript.replace_content(turn, content);
                self.pending = false;
                self.touch();
                None
            }
            TurnEvent::Completed(completion) => {
                let content = self
                    .active
                    .take()
                    .map(|a| a.accumulator)
                    .unwrap_or_default();
                self.pending = false;
                self.touch();
                tracing::info!(bot_id = %turn, len = content.len(), ?completion, "Turn complete");
                Some(TurnOutcome::Completed {
                    content,
                    completion,
                })
            }
            TurnEvent::Failed(failure) => {
                self.active = None;
                self.pending = false;
                self.transcript
                    .replace_content(turn, ChatConfig::failure_notice_for(&self.location));
                self.notify(Notification::new(
                    NotificationLevel::Error,
                    CONNECTION_ERROR_TITLE,
                    CONNECTION_ERROR_DESCRIPTION,
                ));
                self.touch();
                tracing::warn!(bot_id = %turn, error = %failure, "Turn failed");
                Some(TurnOutcome::Failed(failure))
            }
        }
    }

    /// Run a whole turn against `backend`, applying events as they arrive.
    ///
    /// # Errors
    ///
    /// Returns the rejection if the turn could not start. Backend failures
    /// are not errors here; they come back as [`TurnOutcome::Failed`].
    pub async fn submit(
        &mut self,
        backend: Arc<dyn ChatBackend>,
        text: &str,
    ) -> Result<TurnOutcome, SubmitRejected> {
        self.set_backend_location(backend.location());
        let ticket = self.begin_turn(text)?;
        let mut events = turn_events(backend, ticket.message, self.config.idle_timeout());

        while let Some(event) = events.next().await {
            if let Some(outcome) = self.apply(ticket.bot_id, event) {
                return Ok(outcome);
            }
        }

        // Unreachable with turn_events; the session must not stay busy.
        Ok(self
            .apply(ticket.bot_id, TurnEvent::Completed(Completion::StreamClosed))
            .unwrap_or(TurnOutcome::Completed {
                content: String::new(),
                completion: Completion::StreamClosed,
            }))
    }

    /// Discard the conversation and start over with the welcome message.
    ///
    /// An in-flight turn is abandoned; its remaining events are dropped.
    pub fn clear(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(bot_id = %active.bot_id, "Abandoning in-flight turn");
        }
        self.pending = false;
        self.transcript.reset();
        self.notify(Notification::new(
            NotificationLevel::Info,
            CLEARED_TITLE,
            CLEARED_DESCRIPTION,
        ));
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use crate::testing::ScriptedBackend;

    fn session() -> ChatSession {
        ChatSession::new(ChatConfig::default())
    }

    // =========================================================================
    // Submission Tests
    // =========================================================================

    #[test]
    fn begin_turn_appends_user_then_bot() {
        let mut s = session();
        let ticket = s.begin_turn("  What are the library borrowing limits?  ").unwrap();

        assert_eq!(ticket.message, "What are the library borrowing limits?");
        assert_eq!(s.messages().len(), 3);
        let user = &s.messages()[1];
        let bot = &s.messages()[2];
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.content, "What are the library borrowing limits?");
        assert_eq!(bot.sender, Sender::Bot);
        assert!(bot.content.is_empty());
        assert_eq!(bot.id, ticket.bot_id);
        assert!(s.is_busy());
        assert!(s.is_pending());
    }

    #[test]
    fn blank_input_is_rejected_without_changes() {
        let mut s = session();
        let before = s.revision();
        assert_eq!(s.begin_turn(""), Err(SubmitRejected::Empty));
        assert_eq!(s.begin_turn(" \t\n "), Err(SubmitRejected::Empty));
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.revision(), before);
        assert!(!s.is_busy());
    }

    #[test]
    fn busy_session_rejects_second_turn() {
        let mut s = session();
        s.begin_turn("first").unwrap();
        assert_eq!(s.begin_turn("second"), Err(SubmitRejected::Busy));
        assert_eq!(s.messages().len(), 3);
    }

    // =========================================================================
    // Event Application Tests
    // =========================================================================

    #[test]
    fn chunks_replace_placeholder_with_accumulator() {
        let mut s = session();
        let ticket = s.begin_turn("hi").unwrap();

        assert!(s.apply(ticket.bot_id, TurnEvent::Chunk("Hel".into())).is_none());
        assert!(!s.is_pending());
        assert!(s.is_busy());
        assert_eq!(s.transcript().get(ticket.bot_id).unwrap().content, "Hel");

        s.apply(ticket.bot_id, TurnEvent::Chunk("lo".into()));
        let outcome = s.apply(ticket.bot_id, TurnEvent::Completed(Completion::DoneSignal));

        assert_eq!(
            outcome,
            Some(TurnOutcome::Completed {
                content: "Hello".into(),
                completion: Completion::DoneSignal,
            })
        );
        assert_eq!(s.transcript().get(ticket.bot_id).unwrap().content, "Hello");
        assert!(!s.is_busy());
        assert!(!s.is_pending());
    }

    #[test]
    fn failure_writes_notice_and_notifies() {
        let mut s = session();
        let ticket = s.begin_turn("hi").unwrap();
        s.apply(ticket.bot_id, TurnEvent::Chunk("partial".into()));
        let outcome = s.apply(
            ticket.bot_id,
            TurnEvent::Failed(TurnFailure::Backend("backend down".into())),
        );

        assert!(matches!(outcome, Some(TurnOutcome::Failed(_))));
        let content = &s.transcript().get(ticket.bot_id).unwrap().content;
        assert_eq!(content, &s.config().failure_notice());
        assert!(!content.contains("backend down"));
        assert!(!s.is_pending());
        assert!(!s.is_busy());

        let notes = s.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert_eq!(notes[0].title, CONNECTION_ERROR_TITLE);
        assert!(s.take_notifications().is_empty());
    }

    #[test]
    fn events_for_stale_turn_are_dropped() {
        let mut s = session();
        let old = s.begin_turn("first").unwrap();
        s.clear();
        let new = s.begin_turn("second").unwrap();

        assert!(s.apply(old.bot_id, TurnEvent::Chunk("stale".into())).is_none());
        assert!(s
            .apply(old.bot_id, TurnEvent::Completed(Completion::DoneSignal))
            .is_none());

        assert!(s.is_busy());
        assert!(s.is_pending());
        assert!(s.transcript().get(new.bot_id).unwrap().content.is_empty());
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut s = session();
        let rx = s.subscribe();
        let ticket = s.begin_turn("hi").unwrap();
        assert!(rx.has_changed().unwrap());
        let after_begin = s.revision();

        s.apply(ticket.bot_id, TurnEvent::Chunk("a".into()));
        assert!(s.revision() > after_begin);
    }

    // =========================================================================
    // Clear Tests
    // =========================================================================

    #[test]
    fn clear_resets_to_single_welcome() {
        let mut s = session();
        let ticket = s.begin_turn("hi").unwrap();
        s.apply(ticket.bot_id, TurnEvent::Chunk("answer".into()));
        s.clear();

        assert_eq!(s.messages().len(), 1);
        let welcome = &s.messages()[0];
        assert!(welcome.is_bot());
        assert_eq!(welcome.content, s.config().welcome_message);
        assert!(!s.is_busy());
        assert!(!s.is_pending());
        assert!(s.shows_examples());

        let notes = s.take_notifications();
        assert_eq!(notes[0].title, CLEARED_TITLE);
        assert_eq!(notes[0].level, NotificationLevel::Info);
    }

    #[test]
    fn examples_hidden_once_conversation_starts() {
        let mut s = session();
        assert!(s.shows_examples());
        s.begin_turn("hi").unwrap();
        assert!(!s.shows_examples());
    }

    // =========================================================================
    // Inline Submission Tests
    // =========================================================================

    #[tokio::test]
    async fn submit_streams_reply_into_transcript() {
        let backend = Arc::new(ScriptedBackend::lines(&[
            r#"data: {"chunk":"Hel"}"#,
            "not-json-at-all",
            r#"data: {"chunk":"lo"}"#,
            r#"data: {"done":true}"#,
        ]));
        let mut s = session();

        let outcome = s.submit(backend.clone(), " hi ").await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                content: "Hello".into(),
                completion: Completion::DoneSignal,
            }
        );
        assert_eq!(backend.received(), vec!["hi".to_string()]);
        assert_eq!(s.messages().last().unwrap().content, "Hello");
        assert!(!s.is_pending());
        assert!(!s.is_busy());
    }

    #[tokio::test]
    async fn submit_error_frame_takes_error_path() {
        let backend = Arc::new(ScriptedBackend::lines(&[r#"data: {"error":"backend down"}"#]));
        let mut s = session();

        let outcome = s.submit(backend, "hi").await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Failed(TurnFailure::Backend("backend down".into()))
        );
        assert_eq!(s.messages().last().unwrap().content, s.config().failure_notice());
        assert_eq!(s.take_notifications().len(), 1);
        assert!(!s.is_pending());
    }

    #[tokio::test]
    async fn submit_blank_never_contacts_backend() {
        let backend = Arc::new(ScriptedBackend::lines(&[]));
        let mut s = session();

        let result = s.submit(backend.clone(), "   ").await;

        assert_eq!(result, Err(SubmitRejected::Empty));
        assert!(backend.received().is_empty());
        assert_eq!(s.messages().len(), 1);
    }

    #[tokio::test]
    async fn session_usable_after_failure() {
        let mut s = session();
        s.submit(Arc::new(ScriptedBackend::status(500)), "first")
            .await
            .unwrap();

        let outcome = s
            .submit(
                Arc::new(ScriptedBackend::lines(&[r#"data: {"chunk":"ok"}"#])),
                "second",
            )
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        assert_eq!(s.messages().len(), 5);
        assert_eq!(s.messages().last().unwrap().content, "ok");
    }

    #[tokio::test]
    async fn failure_notice_names_backend_in_use() {
        let backend = Arc::new(ScriptedBackend::status(503).at("http://srb.campus:9000"));
        let mut s = ChatSession::new(ChatConfig::with_backend("http://localhost:7860"));

        s.submit(backend, "q").await.unwrap();

        let notice = &s.messages().last().unwrap().content;
        assert!(notice.ends_with("running on http://srb.campus:9000"));
        assert_eq!(notice, &s.failure_notice());
        assert_eq!(s.backend_location(), "http://srb.campus:9000");
    }

    #[test]
    fn failure_notice_defaults_to_configured_backend() {
        let mut s = ChatSession::new(ChatConfig::with_backend("http://srb.local:7860/"));
        let ticket = s.begin_turn("q").unwrap();

        s.apply(ticket.bot_id, TurnEvent::Failed(TurnFailure::Status(500)));

        assert_eq!(
            s.messages().last().unwrap().content,
            ChatConfig::failure_notice_for("http://srb.local:7860")
        );
    }
}
