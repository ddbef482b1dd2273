//! Deterministic mock implementation of the shared `chat_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for offline
//! runs and contract-level integration testing.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use chat_provider::{CancelSignal, ProviderProfile, RunEvent, RunProvider, RunRequest};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const DEFAULT_TOKEN_DELAY: Duration = Duration::from_millis(40);

/// Scripted provider that streams a fixed reply word by word.
#[derive(Debug, Clone)]
pub struct MockProvider {
    chunks: Vec<String>,
    token_delay: Duration,
    failure: Option<String>,
    echo_last_user: bool,
}

impl MockProvider {
    /// Creates a mock provider with caller-provided chunks and no delay.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            token_delay: Duration::ZERO,
            failure: None,
            echo_last_user: false,
        }
    }

    /// Delay slept after every emitted token.
    #[must_use]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Ends each run with `Error(cause)` after the scripted tokens.
    #[must_use]
    pub fn failing_with(mut self, cause: impl Into<String>) -> Self {
        self.failure = Some(cause.into());
        self
    }

    /// Appends the last user message to the scripted reply.
    #[must_use]
    pub fn echoing(mut self) -> Self {
        self.echo_last_user = true;
        self
    }

    fn reply_for(&self, req: &RunRequest) -> Vec<String> {
        let mut chunks = self.chunks.clone();
        if self.echo_last_user {
            if let Some(last) = req
                .messages
                .iter()
                .rev()
                .find(|message| message.role == chat_provider::Role::User)
            {
                chunks.push(format!("You said: {}", last.content));
            }
        }
        chunks
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            "This is the offline mock provider.\n".to_string(),
            "Replies are scripted and streamed word by word ".to_string(),
            "so the session can be exercised without a server.\n".to_string(),
        ])
        .with_token_delay(DEFAULT_TOKEN_DELAY)
        .echoing()
    }
}

impl RunProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock".to_string(),
            endpoint: None,
        }
    }

    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;
        let cancelled = || cancel.load(Ordering::Acquire);

        for chunk in self.reply_for(&req) {
            let mut pending_token = String::new();
            for ch in chunk.chars() {
                pending_token.push(ch);
                if !matches!(ch, ' ' | '\n') {
                    continue;
                }

                if cancelled() {
                    emit(RunEvent::Cancelled { run_id });
                    return Ok(());
                }
                emit(RunEvent::Token {
                    run_id,
                    text: std::mem::take(&mut pending_token),
                });
                thread::sleep(self.token_delay);
            }

            if !pending_token.is_empty() {
                if cancelled() {
                    emit(RunEvent::Cancelled { run_id });
                    return Ok(());
                }
                emit(RunEvent::Token {
                    run_id,
                    text: pending_token,
                });
                thread::sleep(self.token_delay);
            }
        }

        if cancelled() {
            emit(RunEvent::Cancelled { run_id });
        } else if let Some(cause) = &self.failure {
            emit(RunEvent::Error {
                run_id,
                error: cause.clone(),
            });
        } else {
            emit(RunEvent::Done { run_id });
        }

        Ok(())
    }
}
