//! Terminal render adapter.
//!
//! Draws read-only session state with ratatui and turns key presses into
//! session intents. All network work happens on run workers; this module only
//! ever blocks on the foreground event channel.

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::info;
use unicode_width::UnicodeWidthChar;

use crate::app::{App, HostOps};
use crate::instructions::{load_instructions, write_template};
use crate::provider::RunEvent;
use crate::runtime::{lock_unpoisoned, RuntimeController};

pub const HELP_TEXT: &str = "Enter to send • Ctrl+L to clear • Esc to quit";
pub const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

const INPUT_HEIGHT: u16 = 3;
const INPUT_PROMPT: &str = "> ";
const INPUT_PLACEHOLDER: &str = "Describe what you want to build...";
const TAB_WIDTH: usize = 4;

/// One unit of work for the foreground loop.
#[derive(Debug)]
pub enum LoopEvent {
    Input(Event),
    Run(RunEvent),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Setup,
    Chat,
}

/// Presentation state that never affects the conversation.
#[derive(Debug, Clone)]
pub struct UiState {
    pub screen: Screen,
    pub model: String,
    pub base_url: String,
    pub instructions_path: PathBuf,
    /// Lines scrolled up from the bottom of the output pane.
    pub scroll_from_bottom: usize,
    spinner_frame: usize,
    spinner_advanced_at: Instant,
    output_height: usize,
}

impl UiState {
    pub fn new(
        screen: Screen,
        model: impl Into<String>,
        base_url: impl Into<String>,
        instructions_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            screen,
            model: model.into(),
            base_url: base_url.into(),
            instructions_path: instructions_path.into(),
            scroll_from_bottom: 0,
            spinner_frame: 0,
            spinner_advanced_at: Instant::now(),
            output_height: 0,
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    /// Advances the spinner when a frame interval has elapsed.
    pub fn tick_spinner(&mut self, now: Instant) {
        if now.duration_since(self.spinner_advanced_at) >= SPINNER_INTERVAL {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
            self.spinner_advanced_at = now;
        }
    }

    fn page_size(&self) -> usize {
        self.output_height.saturating_sub(1).max(1)
    }
}

pub fn status_text(app: &App, ui: &UiState) -> String {
    if let Some(error) = app.last_error() {
        return format!("Error: {error}");
    }

    if app.is_streaming() {
        return format!("{} Streaming from {}", ui.spinner(), ui.model);
    }

    "Ready".to_string()
}

pub fn draw(frame: &mut Frame, app: &App, ui: &mut UiState) {
    match ui.screen {
        Screen::Setup => draw_setup(frame, app, ui),
        Screen::Chat => draw_chat(frame, app, ui),
    }
}

fn draw_setup(frame: &mut Frame, app: &App, ui: &UiState) {
    let file_name = app.instructions().label().to_string();
    let mut lines = vec![
        Line::from(Span::styled("codybot setup", header_style())),
        Line::from(format!("No {file_name} found. Create one now? (y/n)")),
    ];

    if let Some(error) = app.last_error() {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Last error: {error}")));
    }

    lines.push(Line::from(Span::styled(
        "You can edit it later to steer the agent.",
        subtle_style(),
    )));
    lines.push(Line::from(Span::styled(
        format!("Path: {}", ui.instructions_path.display()),
        subtle_style(),
    )));

    frame.render_widget(Paragraph::new(lines), frame.size());
}

fn draw_chat(frame: &mut Frame, app: &App, ui: &mut UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(INPUT_HEIGHT + 2),
        ])
        .split(frame.size());

    let header = Line::from(vec![
        Span::styled("codybot", header_style()),
        Span::raw(" "),
        Span::styled(format!("{} @ {}", ui.model, ui.base_url), subtle_style()),
    ]);
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let status = Line::from(vec![
        Span::styled(status_text(app, ui), status_style(app)),
        Span::raw("  "),
        Span::styled(HELP_TEXT, subtle_style()),
    ]);
    frame.render_widget(Paragraph::new(status), chunks[1]);

    draw_output(frame, app, ui, chunks[2]);
    draw_input(frame, app, chunks[3]);
}

fn draw_output(frame: &mut Frame, app: &App, ui: &mut UiState, area: Rect) {
    let block = rounded_block();
    let inner = block.inner(area);
    let lines = wrap_lines(app.transcript(), usize::from(inner.width));
    let height = usize::from(inner.height);

    ui.output_height = height;
    let max_scroll = lines.len().saturating_sub(height);
    ui.scroll_from_bottom = ui.scroll_from_bottom.min(max_scroll);

    let end = lines.len() - ui.scroll_from_bottom;
    let start = end.saturating_sub(height);
    let visible: Vec<Line> = lines[start..end]
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();

    frame.render_widget(Paragraph::new(visible).block(block), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let block = rounded_block();
    let inner = block.inner(area);

    if app.input.is_empty() {
        let placeholder = Line::from(vec![
            Span::raw(INPUT_PROMPT),
            Span::styled(INPUT_PLACEHOLDER, subtle_style()),
        ]);
        frame.render_widget(Paragraph::new(placeholder).block(block), area);
        set_cursor(frame, inner, INPUT_PROMPT.len(), 0);
        return;
    }

    let lines = wrap_lines(
        &format!("{INPUT_PROMPT}{}", app.input),
        usize::from(inner.width),
    );
    let height = usize::from(inner.height).max(1);
    let start = lines.len().saturating_sub(height);
    let cursor_column = lines.last().map(|line| display_width(line)).unwrap_or(0);
    let cursor_row = lines.len() - 1 - start;

    let visible: Vec<Line> = lines[start..]
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();
    frame.render_widget(Paragraph::new(visible).block(block), area);
    set_cursor(frame, inner, cursor_column, cursor_row);
}

fn set_cursor(frame: &mut Frame, inner: Rect, column: usize, row: usize) {
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let column = u16::try_from(column)
        .unwrap_or(u16::MAX)
        .min(inner.width - 1);
    let row = u16::try_from(row).unwrap_or(u16::MAX).min(inner.height - 1);
    frame.set_cursor(inner.x + column, inner.y + row);
}

/// Hard-wraps `text` to `width` display columns, keeping empty lines.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;

        for ch in raw.chars() {
            if ch == '\r' {
                continue;
            }
            if ch == '\t' {
                for _ in 0..TAB_WIDTH {
                    push_wrapped(&mut lines, &mut current, &mut current_width, ' ', 1, width);
                }
                continue;
            }

            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            push_wrapped(&mut lines, &mut current, &mut current_width, ch, ch_width, width);
        }

        lines.push(current);
    }

    lines
}

fn push_wrapped(
    lines: &mut Vec<String>,
    current: &mut String,
    current_width: &mut usize,
    ch: char,
    ch_width: usize,
    width: usize,
) {
    if *current_width + ch_width > width && !current.is_empty() {
        lines.push(std::mem::take(current));
        *current_width = 0;
    }
    current.push(ch);
    *current_width += ch_width;
}

fn display_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}

fn rounded_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Indexed(212))
        .add_modifier(Modifier::BOLD)
}

fn subtle_style() -> Style {
    Style::default().fg(Color::Indexed(241))
}

fn status_style(app: &App) -> Style {
    if app.last_error().is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_streaming() {
        Style::default().fg(Color::Indexed(69))
    } else {
        subtle_style()
    }
}

/// Applies a key press on the setup screen.
pub fn handle_setup_key(app: &mut App, ui: &mut UiState, host: &mut dyn HostOps, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            match write_template(&ui.instructions_path) {
                Ok(()) => {
                    info!(path = %ui.instructions_path.display(), "instructions template written");
                    let loaded = load_instructions(&ui.instructions_path);
                    app.set_instructions(loaded.instructions);
                }
                Err(error) => app.set_last_error(error.to_string()),
            }
            ui.screen = Screen::Chat;
        }
        KeyCode::Char('n') | KeyCode::Char('N') => ui.screen = Screen::Chat,
        KeyCode::Esc => app.on_quit(host),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.on_quit(host),
        _ => {}
    }
}

/// Applies a key press on the chat screen.
pub fn handle_chat_key(app: &mut App, ui: &mut UiState, host: &mut dyn HostOps, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.on_quit(host),
        KeyCode::Char('c') if control => app.on_quit(host),
        KeyCode::Char('l') if control => {
            app.on_clear(host);
            ui.scroll_from_bottom = 0;
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.on_input_char('\n'),
        KeyCode::Enter => {
            app.on_submit(host);
            ui.scroll_from_bottom = 0;
        }
        KeyCode::Backspace => app.on_input_backspace(),
        KeyCode::PageUp => {
            ui.scroll_from_bottom = ui.scroll_from_bottom.saturating_add(ui.page_size());
        }
        KeyCode::PageDown => {
            ui.scroll_from_bottom = ui.scroll_from_bottom.saturating_sub(ui.page_size());
        }
        KeyCode::Char(ch) if !control => app.on_input_char(ch),
        _ => {}
    }
}

/// Applies one foreground event to the session and presentation state.
pub fn handle_loop_event(controller: &Arc<RuntimeController>, ui: &mut UiState, event: LoopEvent) {
    match event {
        LoopEvent::Input(Event::Key(key)) => {
            let mut host = Arc::clone(controller);
            let mut app = lock_unpoisoned(controller.app());
            match ui.screen {
                Screen::Setup => handle_setup_key(&mut app, ui, &mut host, key),
                Screen::Chat => handle_chat_key(&mut app, ui, &mut host, key),
            }
        }
        LoopEvent::Input(Event::Paste(text)) => {
            let mut app = lock_unpoisoned(controller.app());
            text.chars().for_each(|ch| app.on_input_char(ch));
        }
        LoopEvent::Input(_) => {}
        LoopEvent::Run(event) => controller.apply_run_event(event),
        LoopEvent::Tick => {}
    }
}

/// Runs the foreground loop until the session asks to exit or every event
/// source has hung up. Redraws after each processed event.
pub fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    controller: &Arc<RuntimeController>,
    ui: &mut UiState,
    events: &Receiver<LoopEvent>,
) -> io::Result<()> {
    loop {
        {
            let app = lock_unpoisoned(controller.app());
            if app.should_exit {
                return Ok(());
            }
            if app.is_streaming() {
                ui.tick_spinner(Instant::now());
            }
            terminal.draw(|frame| draw(frame, &app, ui))?;
        }

        let event = match events.recv_timeout(SPINNER_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => LoopEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };
        handle_loop_event(controller, ui, event);
    }
}

/// Raw-mode alternate-screen terminal, restored on drop.
pub struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(error) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(error);
        }

        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(error) => {
                restore_terminal();
                Err(error)
            }
        }
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        restore_terminal();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_lines_splits_on_width_and_newlines() {
        assert_eq!(wrap_lines("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_lines("ab\n\ncd\n", 10), vec!["ab", "", "cd", ""]);
        assert_eq!(wrap_lines("", 10), vec![""]);
    }

    #[test]
    fn wrap_lines_counts_wide_characters_as_two_columns() {
        assert_eq!(wrap_lines("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn wrap_lines_expands_tabs_and_drops_carriage_returns() {
        assert_eq!(wrap_lines("a\tb\r", 10), vec!["a    b"]);
    }

    #[test]
    fn spinner_advances_only_after_interval() {
        let mut ui = UiState::new(Screen::Chat, "m", "u", "agents.md");
        let start = ui.spinner_advanced_at;
        let first = ui.spinner();

        ui.tick_spinner(start + Duration::from_millis(10));
        assert_eq!(ui.spinner(), first);

        ui.tick_spinner(start + SPINNER_INTERVAL);
        assert_ne!(ui.spinner(), first);
    }
}
