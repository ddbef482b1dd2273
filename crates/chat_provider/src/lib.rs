//! Minimal provider-agnostic contract for streaming one chat completion run.
//!
//! This crate defines only the shared run lifecycle: the conversation message
//! shape handed to a provider, the events a provider relays back, and the
//! provider trait itself. Transport details and session state live elsewhere.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

/// Identifier for one provider run. Monotonically increasing per session.
pub type RunId = u64;

/// Shared cancellation flag for a run.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a provider before any run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion endpoints.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One immutable conversation history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input required to start a provider run.
///
/// `messages` is a snapshot of the conversation taken when the run was
/// requested; later history mutation never reaches an in-flight run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub messages: Vec<ChatMessage>,
}

/// Provider-emitted lifecycle event for a run, tagged with its run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Token { run_id: RunId, text: String },
    Done { run_id: RunId },
    Error { run_id: RunId, error: String },
    Cancelled { run_id: RunId },
}

impl RunEvent {
    /// Returns the run identifier associated with this event.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Done { run_id } | Self::Cancelled { run_id } => *run_id,
            Self::Token { run_id, .. } | Self::Error { run_id, .. } => *run_id,
        }
    }

    /// Returns true when this event terminates the run lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Error { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a run provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
    pub endpoint: Option<String>,
}

/// Provider interface for executing one run request.
pub trait RunProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Executes a run request and emits lifecycle events in provider order.
    ///
    /// Implementations emit zero or more `Token` events followed by exactly one
    /// terminal event. Returning `Err` without a terminal event is reported to
    /// the session as a failed run by the caller.
    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::{
        CancelSignal, ChatMessage, ProviderInitError, ProviderProfile, Role, RunEvent,
        RunProvider, RunRequest,
    };

    struct EchoProvider;

    impl RunProvider for EchoProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "echo".to_string(),
                model_id: "echo-model".to_string(),
                endpoint: None,
            }
        }

        fn run(
            &self,
            req: RunRequest,
            _cancel: CancelSignal,
            emit: &mut dyn FnMut(RunEvent),
        ) -> Result<(), String> {
            let last = req
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            emit(RunEvent::Token {
                run_id: req.run_id,
                text: last,
            });
            emit(RunEvent::Done { run_id: req.run_id });
            Ok(())
        }
    }

    #[test]
    fn run_event_run_id_returns_event_run_id() {
        let run_id = 42;
        let events = [
            RunEvent::Token {
                run_id,
                text: "partial".to_string(),
            },
            RunEvent::Done { run_id },
            RunEvent::Error {
                run_id,
                error: "failure".to_string(),
            },
            RunEvent::Cancelled { run_id },
        ];

        for event in events {
            assert_eq!(event.run_id(), run_id);
        }
    }

    #[test]
    fn only_done_error_and_cancelled_are_terminal() {
        assert!(!RunEvent::Token {
            run_id: 1,
            text: "hello".to_string(),
        }
        .is_terminal());
        assert!(RunEvent::Done { run_id: 1 }.is_terminal());
        assert!(RunEvent::Error {
            run_id: 1,
            error: "boom".to_string(),
        }
        .is_terminal());
        assert!(RunEvent::Cancelled { run_id: 1 }.is_terminal());
    }

    #[test]
    fn role_wire_names_match_chat_completion_roles() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
        assert_eq!(ChatMessage::user("hi").role, Role::User);
    }

    #[test]
    fn provider_init_error_preserves_message() {
        let error = ProviderInitError::new("missing endpoint");
        assert_eq!(error.message(), "missing endpoint");
        assert_eq!(error.to_string(), "missing endpoint");
    }

    #[test]
    fn provider_receives_request_snapshot_and_emits_in_order() {
        let provider = EchoProvider;
        let mut events = Vec::new();
        provider
            .run(
                RunRequest {
                    run_id: 3,
                    messages: vec![ChatMessage::system("sys"), ChatMessage::user("ping")],
                },
                Arc::new(AtomicBool::new(false)),
                &mut |event| events.push(event),
            )
            .expect("echo provider should succeed");

        assert_eq!(
            events,
            vec![
                RunEvent::Token {
                    run_id: 3,
                    text: "ping".to_string(),
                },
                RunEvent::Done { run_id: 3 },
            ]
        );
    }
}
