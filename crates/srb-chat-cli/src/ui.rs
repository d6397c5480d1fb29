//! UI rendering with ratatui.
//!
//! One column: header bar, the conversation with its input line, and a
//! status bar that doubles as the toast area.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use ratatui::Frame;

use srb_chat_core::{Message, NotificationLevel, Sender};

use crate::app::{App, BackendHealth};

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Chat column
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);
    render_chat_column(frame, app, main_layout[1]);
    render_status_bar(frame, app, main_layout[2]);
}

/// Truncate a string in the middle with ellipsis if it exceeds `max_len` chars.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return chars[..max_len].iter().collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = chars[..keep].iter().collect();
    let end: String = chars[chars.len() - keep..].iter().collect();
    format!("{start}...{end}")
}

fn health_style(health: BackendHealth) -> Style {
    match health {
        BackendHealth::Unknown => Style::default().fg(Color::Gray),
        BackendHealth::Ready => Style::default().fg(Color::Green),
        BackendHealth::Unhealthy => Style::default().fg(Color::Yellow),
        BackendHealth::Offline => Style::default().fg(Color::Red),
    }
}

/// Render the header bar with the title and backend status.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "SRB CHAT ASSISTANT";
    let status_text = app.health.as_str();

    // Limit URL to half the header, leaving room for the status label
    let max_url_width = (area.width as usize / 2).saturating_sub(15);
    let display_url = truncate_middle(app.backend_location(), max_url_width);

    let right_width = display_url.chars().count() + status_text.len() + 3;
    let padding = (area.width as usize).saturating_sub(title.len() + right_width);

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, health_style(app.health)),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Lines for one transcript entry.
fn message_lines(msg: &Message) -> Vec<Line<'_>> {
    let (label, label_style) = match msg.sender {
        Sender::User => (
            "[You]",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Sender::Bot => (
            "[SRB]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(label, label_style),
        Span::styled(format!(" {}", msg.timestamp), Style::default().fg(Color::DarkGray)),
    ])];
    lines.extend(
        msg.content
            .split('\n')
            .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::White)))),
    );
    lines.push(Line::from(""));
    lines
}

/// Build every line of the conversation pane.
fn chat_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines: Vec<Line> = Vec::new();
    let placeholder = app.session.active_turn();

    for msg in app.session.messages() {
        // The bot placeholder stays hidden until its first chunk
        if Some(msg.id) == placeholder && msg.content.is_empty() {
            continue;
        }
        lines.extend(message_lines(msg));
    }

    if app.session.is_pending() {
        lines.push(Line::from(Span::styled(
            "[SRB]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(" typing...", Style::default().fg(Color::DarkGray)),
        ]));
        lines.push(Line::from(""));
    }

    if app.examples_active() {
        lines.push(Line::from(Span::styled(
            "Try asking:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        for (i, question) in app.examples().iter().enumerate() {
            let selected = i == app.selected_example;
            let marker = if selected { "> " } else { "  " };
            let style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push(Line::from(Span::styled(format!("{marker}{question}"), style)));
        }
    }

    lines
}

/// Render the conversation and the input line as one unit.
fn render_chat_column(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Chat messages
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1), // +1 for scrollbar
        chat_area_full.height,
    );

    let text = Text::from(chat_lines(app));
    let visible_lines = chat_area.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, chat_area.width as usize);

    // chat_scroll counts lines up from the bottom; the paragraph wants lines
    // skipped from the top.
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
    let effective_scroll = app.chat_scroll.min(max_scroll);
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, chat_area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);
        frame.render_stateful_widget(scrollbar, chat_area_full, &mut scrollbar_state);
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2]);
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(frame: &mut Frame, app: &App, separator_area: Rect, input_area: Rect) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let prompt = "> ";
    let input_line = if app.input_enabled() {
        Line::from(vec![
            Span::styled(prompt, Style::default().fg(Color::Cyan)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
        ])
    } else {
        Line::from(vec![
            Span::styled(prompt, Style::default().fg(Color::DarkGray)),
            Span::styled("waiting for reply...", Style::default().fg(Color::DarkGray)),
        ])
    };
    frame.render_widget(Paragraph::new(input_line), input_area);

    // No cursor while the input is disabled
    if app.input_enabled() {
        let offset = cursor_offset(prompt, app);
        frame.set_cursor_position((input_area.x.saturating_add(offset), input_area.y));
    }
}

/// Display cells between the start of the input line and the cursor.
fn cursor_offset(prompt: &str, app: &App) -> u16 {
    let cells = Span::raw(prompt).width() + Span::raw(app.input_before_cursor()).width();
    u16::try_from(cells).unwrap_or(u16::MAX)
}

/// Render the status bar: the current toast, or key help.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(toast) = &app.toast {
        let color = match toast.notification.level {
            NotificationLevel::Info => Color::Green,
            NotificationLevel::Error => Color::Red,
        };
        Line::from(vec![
            Span::styled(format!(" {}: ", toast.notification.title), Style::default().fg(color).bold()),
            Span::styled(toast.notification.description.as_str(), Style::default().fg(color)),
        ])
    } else if app.session.is_busy() {
        Line::from(vec![
            Span::styled(format!(" {} ", app.spinner_char()), Style::default().fg(Color::Yellow)),
            Span::raw("SRB is answering "),
            Span::styled("Ctrl+L", Style::default().fg(Color::Yellow)),
            Span::raw(":clear "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(":quit"),
        ])
    } else {
        let mut spans = vec![
            Span::raw(" "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(":send "),
        ];
        if app.examples_active() {
            spans.push(Span::styled("Up/Down", Style::default().fg(Color::Yellow)));
            spans.push(Span::raw(":examples "));
        }
        spans.extend([
            Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
            Span::raw(":scroll "),
            Span::styled("Ctrl+L", Style::default().fg(Color::Yellow)),
            Span::raw(":clear "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(":quit"),
        ]);
        Line::from(spans)
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }

    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use srb_chat_core::testing::ScriptedBackend;
    use srb_chat_core::{ChatConfig, TurnEvent};

    use super::*;

    fn app() -> App {
        App::with_backend(Arc::new(ScriptedBackend::lines(&[])), ChatConfig::default())
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(ratatui::buffer::Cell::symbol).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // =========================================================================
    // Rendering Tests
    // =========================================================================

    #[test]
    fn fresh_chat_shows_welcome_and_examples() {
        let screen = screen(&app());
        assert!(screen.contains("SRB CHAT ASSISTANT"));
        assert!(screen.contains("[SRB]"));
        assert!(screen.contains("Try asking:"));
        assert!(screen.contains("> Explain the attendance rules."));
        assert!(screen.contains("[checking]"));
    }

    #[test]
    fn pending_turn_shows_typing_indicator() {
        let mut app = app();
        app.session.begin_turn("Explain the attendance rules.").unwrap();

        let screen = screen(&app);
        assert!(screen.contains("typing..."));
        assert!(screen.contains("waiting for reply..."));
        assert!(!screen.contains("Try asking:"));
    }

    #[test]
    fn streamed_text_replaces_indicator() {
        let mut app = app();
        let ticket = app.session.begin_turn("q").unwrap();
        app.session
            .apply(ticket.bot_id, TurnEvent::Chunk("Attendance must be 75%.".into()));

        let screen = screen(&app);
        assert!(screen.contains("Attendance must be 75%."));
        assert!(!screen.contains("typing..."));
    }

    #[test]
    fn toast_replaces_key_help() {
        let mut app = app();
        app.clear_chat();

        let screen = screen(&app);
        assert!(screen.contains("Chat cleared: Your conversation has been reset."));
        assert!(!screen.contains(":send"));
    }

    #[test]
    fn cursor_sits_after_wide_characters() {
        let mut app = app();
        for c in "你好a".chars() {
            app.insert_char(c);
        }
        app.move_cursor_left();

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let position = terminal.get_cursor_position().unwrap();

        // Border, then "> " and two double-width characters
        assert_eq!(position.x, 1 + 2 + 4);
    }

    // =========================================================================
    // Helper Tests
    // =========================================================================

    #[test]
    fn cursor_offset_counts_display_cells() {
        let mut app = app();
        assert_eq!(cursor_offset("> ", &app), 2);

        for c in "日本語".chars() {
            app.insert_char(c);
        }
        assert_eq!(cursor_offset("> ", &app), 2 + 6);

        app.move_cursor_start();
        app.move_cursor_right();
        assert_eq!(cursor_offset("> ", &app), 2 + 2);
    }

    #[test]
    fn truncate_middle_respects_char_boundaries() {
        assert_eq!(truncate_middle("http://localhost:7860", 40), "http://localhost:7860");
        assert_eq!(truncate_middle("ééééééééééé", 9), "ééé...ééé");
        assert_eq!(truncate_middle("abcdef", 3), "abc");
    }

    #[test]
    fn wrapped_line_count_rounds_up() {
        let text = Text::from(vec![Line::from("abcdefghij"), Line::from(""), Line::from("abc")]);
        assert_eq!(calculate_wrapped_line_count(&text, 4), 3 + 1 + 1);
        assert_eq!(calculate_wrapped_line_count(&text, 0), 3);
    }
}
