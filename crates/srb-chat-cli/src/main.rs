//! SRB Chat - terminal client for the SRB question-answering backend.
//!
//! This is the entry point for the `srb-chat` binary.

mod app;
mod ui;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use srb_chat_core::{turn_events, ChatConfig, ChatSession, HttpBackend, TurnEvent, TurnOutcome};

use app::{App, BackendHealth, TurnUpdate, HEALTH_INTERVAL};

/// SRB Chat - ask the Student Resource Book assistant from the terminal.
#[derive(Parser, Debug)]
#[command(name = "srb-chat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "SRB_CHAT_BACKEND", default_value = "http://localhost:7860")]
    backend: String,

    /// Fail a reply after this many seconds without data.
    #[arg(long, env = "SRB_CHAT_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question and print the answer.
    Ask {
        /// The question.
        question: String,

        /// Use the non-streaming endpoint.
        #[arg(long)]
        no_stream: bool,
    },
    /// Check whether the backend is ready.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.debug, args.command.is_some());

    let mut config = ChatConfig::with_backend(args.backend);
    config.idle_timeout_seconds = args.idle_timeout;
    let client = Arc::new(HttpBackend::new(config).context("Invalid backend configuration")?);

    match args.command {
        Some(Command::Ask {
            question,
            no_stream,
        }) => run_ask(client, &question, no_stream).await,
        Some(Command::Health) => run_health(&client).await,
        None => run_tui(client).await,
    }
}

/// Logs go to stderr. The TUI owns the terminal, so it only logs with `--debug`.
fn init_tracing(debug: bool, headless: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter("srb_chat_core=debug,srb_chat_cli=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    } else if headless {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Ask one question, streaming the answer to stdout as it arrives.
async fn run_ask(client: Arc<HttpBackend>, question: &str, no_stream: bool) -> anyhow::Result<()> {
    if no_stream {
        let reply = client.ask(question).await?;
        println!("{}", reply.response);
        return Ok(());
    }

    let mut session = ChatSession::new(client.config().clone());
    session.set_backend_location(client.base_url());
    let ticket = session.begin_turn(question)?;
    let mut events = turn_events(client, ticket.message, session.config().idle_timeout());

    let mut stdout = io::stdout();
    while let Some(event) = events.next().await {
        if let TurnEvent::Chunk(text) = &event {
            write!(stdout, "{text}")?;
            stdout.flush()?;
        }
        match session.apply(ticket.bot_id, event) {
            Some(TurnOutcome::Completed { .. }) => break,
            Some(TurnOutcome::Failed(failure)) => {
                writeln!(stdout)?;
                anyhow::bail!("{} ({failure})", session.failure_notice());
            }
            None => {}
        }
    }
    writeln!(stdout)?;

    Ok(())
}

/// Print backend health; fails unless the backend is ready.
async fn run_health(client: &HttpBackend) -> anyhow::Result<()> {
    let health = client
        .health()
        .await
        .with_context(|| format!("Backend at {} is unreachable", client.base_url()))?;

    println!(
        "status: {}, models loaded: {}",
        health.status, health.models_loaded
    );
    if !health.is_ready() {
        anyhow::bail!("Backend is not ready");
    }
    Ok(())
}

async fn run_tui(client: Arc<HttpBackend>) -> anyhow::Result<()> {
    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(client);
    let result = run_event_loop(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
///
/// Every turn event that changes the session triggers an immediate redraw, so
/// replies appear chunk by chunk.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    let (turn_tx, mut turn_rx) = mpsc::channel::<TurnUpdate>(128);
    let (health_tx, mut health_rx) = mpsc::channel::<BackendHealth>(4);

    // First tick fires immediately, which doubles as the initial health check
    let mut health_interval = tokio::time::interval(HEALTH_INTERVAL);

    loop {
        app.tick_animation();
        app.expire_toast(Instant::now());

        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.needs_fast_tick() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt, &turn_tx);
                    }
                }
            }

            Some((turn, event)) = turn_rx.recv() => {
                if app.handle_turn_event(turn, event) {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            Some(health) = health_rx.recv() => {
                app.health = health;
            }

            _ = health_interval.tick() => {
                if !app.session.is_busy() {
                    app.check_health(&health_tx);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Handle terminal events.
fn handle_input(app: &mut App, event: Event, turn_tx: &mpsc::Sender<TurnUpdate>) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key, turn_tx),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle a key press.
///
/// Quit, clear and scrolling always work. Editing and submitting only work
/// while no reply is streaming.
fn handle_key(app: &mut App, key: KeyEvent, turn_tx: &mpsc::Sender<TurnUpdate>) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('l') if ctrl => {
            app.clear_chat();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_chat_up(10);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_chat_down(10);
            return;
        }
        KeyCode::Up if app.examples_active() && app.input.is_empty() => {
            app.select_prev_example();
            return;
        }
        KeyCode::Down if app.examples_active() && app.input.is_empty() => {
            app.select_next_example();
            return;
        }
        KeyCode::Up => {
            app.scroll_chat_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_chat_down(1);
            return;
        }
        _ => {}
    }

    if !app.input_enabled() {
        return;
    }

    match key.code {
        KeyCode::Enter => {
            if let Err(e) = app.submit_input(turn_tx) {
                tracing::debug!(reason = %e, "Submission ignored");
            }
        }
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}
