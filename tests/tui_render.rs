use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;

use codybot::app::{App, HostOps, Mode};
use codybot::instructions::ProjectInstructions;
use codybot::provider::{ChatMessage, RunId};
use codybot::tui::{draw, handle_chat_key, handle_setup_key, Screen, UiState, HELP_TEXT};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct HostSpy {
    started: Vec<Vec<ChatMessage>>,
    cancelled: Vec<RunId>,
}

impl HostOps for HostSpy {
    fn start_run(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        self.started.push(messages);
        Ok(self.started.len() as RunId)
    }

    fn cancel_run(&mut self, run_id: RunId) {
        self.cancelled.push(run_id);
    }
}

fn chat_ui() -> UiState {
    UiState::new(
        Screen::Chat,
        "test-model",
        "http://localhost:11434/v1",
        "agents.md",
    )
}

fn render(app: &App, ui: &mut UiState, width: u16, height: u16) -> Vec<String> {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("test terminal");
    terminal
        .draw(|frame| draw(frame, app, ui))
        .expect("draw should succeed");

    let buffer = terminal.backend().buffer();
    buffer
        .content
        .chunks(usize::from(buffer.area.width))
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect()
}

fn contains_line(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|line| line.contains(needle))
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn key_with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
    KeyEvent::new(code, modifiers)
}

fn type_text(app: &mut App, ui: &mut UiState, host: &mut HostSpy, text: &str) {
    for ch in text.chars() {
        handle_chat_key(app, ui, host, key(KeyCode::Char(ch)));
    }
}

#[test]
fn idle_chat_screen_shows_header_status_and_placeholder() {
    let app = App::default();
    let mut ui = chat_ui();

    let lines = render(&app, &mut ui, 80, 24);

    assert!(lines[0].starts_with("codybot test-model @ http://localhost:11434/v1"));
    assert!(lines[1].starts_with("Ready"));
    assert!(lines[1].contains(HELP_TEXT));
    assert!(contains_line(&lines, "> Describe what you want to build..."));
}

#[test]
fn transcript_is_rendered_in_output_pane() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    app.send("hi", &mut host);
    app.on_run_token(1, "Hello there");
    app.on_run_done(1);
    let mut ui = chat_ui();

    let lines = render(&app, &mut ui, 80, 24);

    assert!(contains_line(&lines, "You: hi"));
    assert!(contains_line(&lines, "Assistant: Hello there"));
}

#[test]
fn status_line_reflects_streaming_and_error_states() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();

    app.send("hi", &mut host);
    let streaming = render(&app, &mut ui, 80, 24);
    assert!(streaming[1].contains("Streaming from test-model"));

    app.on_run_error(1, "API error: 500 boom");
    let failed = render(&app, &mut ui, 80, 24);
    assert!(failed[1].starts_with("Error: API error: 500 boom"));
}

#[test]
fn typed_input_is_rendered_after_prompt() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();

    type_text(&mut app, &mut ui, &mut host, "draft");
    let lines = render(&app, &mut ui, 80, 24);

    assert_eq!(app.input, "draft");
    assert!(contains_line(&lines, "> draft"));
    assert!(!contains_line(&lines, "Describe what you want to build"));
}

#[test]
fn setup_screen_offers_to_create_instructions_file() {
    let app = App::default();
    let mut ui = UiState::new(Screen::Setup, "m", "u", "project/agents.md");

    let lines = render(&app, &mut ui, 80, 12);

    assert!(lines[0].starts_with("codybot setup"));
    assert!(contains_line(&lines, "No agents.md found. Create one now? (y/n)"));
    assert!(contains_line(&lines, "Path: project/agents.md"));
}

#[test]
fn setup_yes_writes_template_and_loads_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/agents.md");
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = UiState::new(Screen::Setup, "m", "u", path.clone());

    handle_setup_key(&mut app, &mut ui, &mut host, key(KeyCode::Char('y')));

    assert_eq!(ui.screen, Screen::Chat);
    assert!(path.is_file());
    assert_eq!(app.last_error(), None);
    assert!(!app.instructions().content().is_empty());
    assert_eq!(app.history().len(), 1);
    assert!(app.history()[0]
        .content
        .contains(app.instructions().content().trim()));
}

#[test]
fn setup_write_failure_is_reported_and_chat_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").expect("write blocker");
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = UiState::new(Screen::Setup, "m", "u", blocker.join("agents.md"));

    handle_setup_key(&mut app, &mut ui, &mut host, key(KeyCode::Char('y')));

    assert_eq!(ui.screen, Screen::Chat);
    assert!(app.last_error().is_some());
    assert_eq!(app.instructions(), &ProjectInstructions::default());
}

#[test]
fn setup_no_skips_to_chat_and_escape_quits() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = UiState::new(Screen::Setup, "m", "u", "agents.md");

    handle_setup_key(&mut app, &mut ui, &mut host, key(KeyCode::Char('n')));
    assert_eq!(ui.screen, Screen::Chat);
    assert!(!app.should_exit);

    let mut ui = UiState::new(Screen::Setup, "m", "u", "agents.md");
    handle_setup_key(&mut app, &mut ui, &mut host, key(KeyCode::Esc));
    assert!(app.should_exit);
}

#[test]
fn enter_submits_and_alt_enter_inserts_newline() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();

    type_text(&mut app, &mut ui, &mut host, "one");
    handle_chat_key(
        &mut app,
        &mut ui,
        &mut host,
        key_with(KeyCode::Enter, KeyModifiers::ALT),
    );
    type_text(&mut app, &mut ui, &mut host, "two");
    assert_eq!(app.input, "one\ntwo");

    handle_chat_key(&mut app, &mut ui, &mut host, key(KeyCode::Backspace));
    handle_chat_key(&mut app, &mut ui, &mut host, key(KeyCode::Enter));

    assert_eq!(app.input, "");
    assert_eq!(app.mode, Mode::Streaming { run_id: 1 });
    assert_eq!(
        host.started[0].last(),
        Some(&ChatMessage::user("one\ntw"))
    );
}

#[test]
fn control_l_clears_and_escape_quits() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();
    app.send("hi", &mut host);
    ui.scroll_from_bottom = 3;

    handle_chat_key(
        &mut app,
        &mut ui,
        &mut host,
        key_with(KeyCode::Char('l'), KeyModifiers::CONTROL),
    );

    assert_eq!(host.cancelled, vec![1]);
    assert_eq!(app.mode, Mode::Idle);
    assert_eq!(app.transcript(), "");
    assert_eq!(ui.scroll_from_bottom, 0);

    handle_chat_key(&mut app, &mut ui, &mut host, key(KeyCode::Esc));
    assert_eq!(app.mode, Mode::Exiting);
    assert!(app.should_exit);
}

#[test]
fn key_release_events_are_ignored() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();
    let release = KeyEvent {
        code: KeyCode::Char('x'),
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Release,
        state: KeyEventState::NONE,
    };

    handle_chat_key(&mut app, &mut ui, &mut host, release);

    assert_eq!(app.input, "");
}

#[test]
fn page_up_scrolls_output_away_from_bottom() {
    let mut app = App::default();
    let mut host = HostSpy::default();
    let mut ui = chat_ui();
    app.send("x", &mut host);
    let reply = (0..50)
        .map(|index| format!("line {index}"))
        .collect::<Vec<_>>()
        .join("\n");
    app.on_run_token(1, &reply);
    app.on_run_done(1);

    let bottom = render(&app, &mut ui, 40, 20);
    assert!(contains_line(&bottom, "line 47"));

    handle_chat_key(&mut app, &mut ui, &mut host, key(KeyCode::PageUp));
    let scrolled = render(&app, &mut ui, 40, 20);
    assert!(ui.scroll_from_bottom > 0);
    assert!(!contains_line(&scrolled, "line 47"));

    handle_chat_key(&mut app, &mut ui, &mut host, key(KeyCode::PageDown));
    let back = render(&app, &mut ui, 40, 20);
    assert_eq!(ui.scroll_from_bottom, 0);
    assert!(contains_line(&back, "line 47"));
}
