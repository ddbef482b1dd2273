use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::instructions::ProjectInstructions;
use crate::provider::{ChatMessage, RunId};

/// Maximum number of characters accepted in the input box.
pub const INPUT_CHAR_LIMIT: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Streaming { run_id: RunId },
    Exiting,
}

/// Session state machine.
///
/// Sole owner of conversation history and transcript. Run events are applied
/// one at a time and only while their run id matches the active run, so a
/// stream that was cleared away can never touch the new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub mode: Mode,
    pub input: String,
    transcript: String,
    history: Vec<ChatMessage>,
    partial: String,
    last_error: Option<String>,
    instructions: ProjectInstructions,
    pub should_exit: bool,
}

pub trait HostOps {
    /// Starts a run over an immutable history snapshot.
    fn start_run(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String>;
    fn cancel_run(&mut self, run_id: RunId);
}

impl Default for App {
    fn default() -> Self {
        Self::new(ProjectInstructions::default())
    }
}

impl App {
    pub fn new(instructions: ProjectInstructions) -> Self {
        let history = vec![ChatMessage::system(instructions.system_prompt())];

        Self {
            mode: Mode::Idle,
            input: String::new(),
            transcript: String::new(),
            history,
            partial: String::new(),
            last_error: None,
            instructions,
            should_exit: false,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Assistant text received so far for the active run.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn instructions(&self) -> &ProjectInstructions {
        &self.instructions
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.mode, Mode::Streaming { .. })
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        match self.mode {
            Mode::Streaming { run_id } => Some(run_id),
            Mode::Idle | Mode::Exiting => None,
        }
    }

    /// Replaces the system message and resets the conversation to it.
    pub fn set_instructions(&mut self, instructions: ProjectInstructions) {
        self.instructions = instructions;
        self.history = vec![self.system_message()];
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn on_input_replace(&mut self, text: String) {
        self.input = text;
        truncate_chars(&mut self.input, INPUT_CHAR_LIMIT);
    }

    pub fn on_input_char(&mut self, ch: char) {
        if self.input.chars().count() < INPUT_CHAR_LIMIT {
            self.input.push(ch);
        }
    }

    pub fn on_input_backspace(&mut self) {
        self.input.pop();
    }

    /// Handles Enter: `/clear` and `/quit` run in any state, `/help` and
    /// text only when idle. Input rejected while streaming stays intact.
    pub fn on_submit(&mut self, host: &mut dyn HostOps) {
        match parse_slash_command(&self.input) {
            Some(SlashCommand::Clear) => {
                self.input.clear();
                self.on_clear(host);
                return;
            }
            Some(SlashCommand::Quit) => {
                self.input.clear();
                self.on_quit(host);
                return;
            }
            Some(SlashCommand::Help) if !self.is_streaming() => {
                self.input.clear();
                self.append_transcript(&format!("{HELP_TEXT}\n\n"));
                return;
            }
            Some(SlashCommand::Help) | None => {}
        }

        if self.is_streaming() || self.input.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.input);
        self.send(&text, host);
    }

    /// `Idle --send(text)--> Streaming`.
    ///
    /// No-op when the trimmed text is empty or a stream is already active.
    pub fn send(&mut self, text: &str, host: &mut dyn HostOps) {
        let text = text.trim();
        if text.is_empty() || !matches!(self.mode, Mode::Idle) {
            return;
        }

        self.append_transcript(&format!("You: {text}\n\nAssistant: "));
        self.history.push(ChatMessage::user(text));
        self.last_error = None;
        self.partial.clear();

        match host.start_run(self.history.clone()) {
            Ok(run_id) => self.mode = Mode::Streaming { run_id },
            Err(error) => {
                self.append_transcript(&format!("\n\n[error] {error}\n\n"));
                self.last_error = Some(error);
            }
        }
    }

    pub fn on_run_token(&mut self, run_id: RunId, text: &str) {
        if !self.is_active_run(run_id) || text.is_empty() {
            return;
        }

        self.append_transcript(text);
        self.partial.push_str(text);
    }

    pub fn on_run_done(&mut self, run_id: RunId) {
        if !self.is_active_run(run_id) {
            return;
        }

        let reply = std::mem::take(&mut self.partial);
        if !reply.trim().is_empty() {
            self.history.push(ChatMessage::assistant(reply));
        }
        self.append_transcript("\n\n");
        self.last_error = None;
        self.mode = Mode::Idle;
    }

    pub fn on_run_error(&mut self, run_id: RunId, error: &str) {
        if !self.is_active_run(run_id) {
            return;
        }

        self.partial.clear();
        self.append_transcript(&format!("\n\n[error] {error}\n\n"));
        self.last_error = Some(error.to_string());
        self.mode = Mode::Idle;
    }

    /// A cancelled run behaves like a failed one without an error message:
    /// no assistant turn is recorded and the user message stays.
    pub fn on_run_cancelled(&mut self, run_id: RunId) {
        if !self.is_active_run(run_id) {
            return;
        }

        self.partial.clear();
        self.append_transcript("\n\n");
        self.mode = Mode::Idle;
    }

    /// `(any) --clear--> Idle`.
    pub fn on_clear(&mut self, host: &mut dyn HostOps) {
        self.cancel_active_run(host);
        self.history = vec![self.system_message()];
        self.transcript.clear();
        self.partial.clear();
        if !matches!(self.mode, Mode::Exiting) {
            self.mode = Mode::Idle;
        }
    }

    pub fn on_quit(&mut self, host: &mut dyn HostOps) {
        self.cancel_active_run(host);
        self.mode = Mode::Exiting;
        self.should_exit = true;
    }

    fn cancel_active_run(&mut self, host: &mut dyn HostOps) {
        if let Some(run_id) = self.active_run_id() {
            host.cancel_run(run_id);
            self.mode = Mode::Idle;
        }
    }

    fn is_active_run(&self, run_id: RunId) -> bool {
        self.active_run_id() == Some(run_id)
    }

    fn system_message(&self) -> ChatMessage {
        ChatMessage::system(self.instructions.system_prompt())
    }

    fn append_transcript(&mut self, text: &str) {
        self.transcript.push_str(text);
    }
}

fn truncate_chars(text: &mut String, limit: usize) {
    if let Some((index, _)) = text.char_indices().nth(limit) {
        text.truncate(index);
    }
}
