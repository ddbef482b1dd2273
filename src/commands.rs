#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Quit,
}

pub const HELP_TEXT: &str = "Commands: /help, /clear, /quit";

/// Recognizes input that is exactly one known command.
///
/// Anything else, including text that merely starts with `/`, is a prompt.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    match input.trim() {
        "/help" => Some(SlashCommand::Help),
        "/clear" => Some(SlashCommand::Clear),
        "/quit" | "/exit" => Some(SlashCommand::Quit),
        _ => None,
    }
}
