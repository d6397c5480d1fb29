//! Application state.
//!
//! `App` wraps a [`ChatSession`] with everything that only matters on screen:
//! the input line, scroll offset, example selection, the current toast and
//! the last known backend health.
//!
//! Each turn's events are produced on their own task and forwarded over an
//! mpsc channel tagged with the turn id, so the event loop can redraw after
//! every chunk while the session drops anything from an abandoned turn.
//! Health checks run on their own task too and report back the same way,
//! so a slow backend never stalls input handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use srb_chat_core::{
    turn_events, ChatBackend, ChatConfig, ChatSession, HealthStatus, HttpBackend, MessageId,
    Notification, SubmitRejected, TurnEvent,
};

/// How often backend health is re-checked while idle.
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// How long a toast stays in the status bar.
pub const TOAST_DURATION: Duration = Duration::from_secs(4);

/// One turn event, tagged with the id of the turn it belongs to.
pub type TurnUpdate = (MessageId, TurnEvent);

/// Last known state of the backend, shown in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendHealth {
    /// Not checked yet.
    #[default]
    Unknown,
    /// Healthy with models loaded.
    Ready,
    /// Reachable but not able to answer.
    Unhealthy,
    /// Not reachable.
    Offline,
}

impl BackendHealth {
    /// Classify the result of a health request.
    #[must_use]
    pub fn from_result(result: srb_chat_core::Result<HealthStatus>) -> Self {
        match result {
            Ok(status) if status.is_ready() => Self::Ready,
            Ok(status) => {
                tracing::debug!(status = %status.status, models_loaded = status.models_loaded, "Backend not ready");
                Self::Unhealthy
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                Self::Offline
            }
        }
    }

    /// Label for the header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "checking",
            Self::Ready => "ready",
            Self::Unhealthy => "unhealthy",
            Self::Offline => "offline",
        }
    }
}

/// A notification currently on screen.
#[derive(Debug, Clone)]
pub struct Toast {
    /// What to show.
    pub notification: Notification,
    shown_at: Instant,
}

/// Application state.
pub struct App {
    /// Source of streamed replies.
    backend: Arc<dyn ChatBackend>,
    /// HTTP client used for health checks, when talking to a real backend.
    health_client: Option<Arc<HttpBackend>>,
    /// Forwarder of the current turn's events.
    turn_task: Option<JoinHandle<()>>,
    /// Health check in flight.
    health_task: Option<JoinHandle<()>>,
    /// Transcript and turn state.
    pub session: ChatSession,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Chat scroll position, in lines up from the bottom.
    pub chat_scroll: usize,
    /// Highlighted example question.
    pub selected_example: usize,
    /// Toast in the status bar.
    pub toast: Option<Toast>,
    /// Last known backend health.
    pub health: BackendHealth,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for the typing indicator.
    pub animation_frame: usize,
}

impl App {
    /// Create the app for a real HTTP backend.
    #[must_use]
    pub fn new(client: Arc<HttpBackend>) -> Self {
        let config = client.config().clone();
        let mut app = Self::with_backend(client.clone(), config);
        app.health_client = Some(client);
        app
    }

    /// Create the app for any backend. Health checks are skipped.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn ChatBackend>, config: ChatConfig) -> Self {
        let mut session = ChatSession::new(config);
        session.set_backend_location(backend.location());
        Self {
            backend,
            health_client: None,
            turn_task: None,
            health_task: None,
            session,
            input: String::new(),
            cursor_position: 0,
            chat_scroll: 0,
            selected_example: 0,
            toast: None,
            health: BackendHealth::Unknown,
            should_quit: false,
            animation_frame: 0,
        }
    }

    /// Backend location for display.
    #[must_use]
    pub fn backend_location(&self) -> &str {
        self.backend.location()
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for the typing indicator.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Whether the input line accepts edits.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        !self.session.is_busy()
    }

    /// Whether the loop should tick faster for a smooth spinner.
    #[must_use]
    pub fn needs_fast_tick(&self) -> bool {
        self.session.is_busy()
    }

    // =========================================================================
    // Example Questions
    // =========================================================================

    /// Example questions from the config.
    #[must_use]
    pub fn examples(&self) -> &[String] {
        &self.session.config().example_questions
    }

    /// Whether example questions are on screen and selectable.
    #[must_use]
    pub fn examples_active(&self) -> bool {
        self.session.shows_examples() && !self.examples().is_empty()
    }

    /// Move the example highlight up, wrapping at the top.
    pub fn select_prev_example(&mut self) {
        let count = self.examples().len();
        if count == 0 {
            return;
        }
        self.selected_example = match self.selected_example {
            0 => count - 1,
            i => (i - 1).min(count - 1),
        };
    }

    /// Move the example highlight down, wrapping at the bottom.
    pub fn select_next_example(&mut self) {
        let count = self.examples().len();
        if count == 0 {
            return;
        }
        self.selected_example = (self.selected_example + 1) % count;
    }

    /// The highlighted example question.
    #[must_use]
    pub fn selected_example_text(&self) -> Option<&str> {
        self.examples()
            .get(self.selected_example)
            .map(String::as_str)
    }

    // =========================================================================
    // Chat Scrolling
    // =========================================================================

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    /// The part of the input left of the cursor.
    #[must_use]
    pub fn input_before_cursor(&self) -> &str {
        &self.input[..self.byte_index(self.cursor_position)]
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_chars() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete back to the previous space.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            if self.cursor_position > 0 {
                let prev = self.input.chars().nth(self.cursor_position - 1);
                if prev == Some(' ') {
                    break;
                }
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input_chars() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input_chars();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Submit the input line, or the highlighted example when it is empty.
    ///
    /// The input is only cleared once the turn has started.
    pub fn submit_input(&mut self, tx: &mpsc::Sender<TurnUpdate>) -> Result<MessageId, SubmitRejected> {
        let text = if self.input.trim().is_empty() && self.examples_active() {
            self.selected_example_text().unwrap_or_default().to_string()
        } else {
            self.input.clone()
        };

        let turn = self.start_turn(&text, tx)?;
        self.clear_input();
        Ok(turn)
    }

    /// Start a turn and forward its events to `tx` from a background task.
    pub fn start_turn(
        &mut self,
        text: &str,
        tx: &mpsc::Sender<TurnUpdate>,
    ) -> Result<MessageId, SubmitRejected> {
        let ticket = self.session.begin_turn(text)?;
        self.chat_scroll = 0;

        let turn = ticket.bot_id;
        let mut events = turn_events(
            self.backend.clone(),
            ticket.message,
            self.session.config().idle_timeout(),
        );
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if tx.send((turn, event)).await.is_err() {
                    tracing::debug!(turn = %turn, "Event loop gone, dropping turn");
                    break;
                }
            }
        });

        // The previous forwarder has delivered its terminal event by now
        if let Some(previous) = self.turn_task.replace(task) {
            previous.abort();
        }

        Ok(turn)
    }

    /// Apply one forwarded turn event.
    ///
    /// Returns true if anything visible changed and the UI should redraw now.
    pub fn handle_turn_event(&mut self, turn: MessageId, event: TurnEvent) -> bool {
        let before = self.session.revision();
        self.session.apply(turn, event);
        self.collect_notifications();
        self.session.revision() != before
    }

    /// Discard the conversation and show the welcome message again.
    ///
    /// A streaming turn is cancelled, closing its connection.
    pub fn clear_chat(&mut self) {
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.session.clear();
        self.chat_scroll = 0;
        self.selected_example = 0;
        self.clear_input();
        self.collect_notifications();
    }

    // =========================================================================
    // Toasts and Health
    // =========================================================================

    fn collect_notifications(&mut self) {
        if let Some(notification) = self.session.take_notifications().pop() {
            self.toast = Some(Toast {
                notification,
                shown_at: Instant::now(),
            });
        }
    }

    /// Drop the toast once it has been on screen long enough.
    pub fn expire_toast(&mut self, now: Instant) {
        if self
            .toast
            .as_ref()
            .is_some_and(|t| now.saturating_duration_since(t.shown_at) >= TOAST_DURATION)
        {
            self.toast = None;
        }
    }

    /// Start a background health check that reports to `tx`.
    ///
    /// No-op without an HTTP backend or while a check is still running.
    pub fn check_health(&mut self, tx: &mpsc::Sender<BackendHealth>) {
        let Some(health_client) = self.health_client.clone() else {
            return;
        };
        if self.health_task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let tx = tx.clone();
        self.health_task = Some(tokio::spawn(async move {
            let health = BackendHealth::from_result(health_client.health().await);
            let _ = tx.send(health).await;
        }));
    }
}
