//! OpenAI-compatible implementation of the shared `chat_provider` contract.
//!
//! Each run owns a dedicated current-thread tokio runtime, streams one chat
//! completion through `chat_api`, and relays decoded tokens as `RunEvent`s the
//! moment they arrive. Exactly one terminal event is emitted per run.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chat_api::{
    ChatApiClient, ChatApiConfig, ChatApiError, ChatRequest, StreamEnd, StreamEvent, WireMessage,
    DEFAULT_BASE_URL,
};
use chat_provider::{
    CancelSignal, ChatMessage, ProviderInitError, ProviderProfile, RunEvent, RunProvider,
    RunRequest,
};
use tracing::{debug, warn};

/// Stable provider identifier used by startup selection.
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "qwen3-coder";

/// Runtime configuration for the OpenAI-compatible provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Option<Duration>,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout: None,
        }
    }
}

impl OpenAiProviderConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn to_chat_api_config(&self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(&self.base_url)
            .with_api_key(&self.api_key)
            .with_user_agent(concat!("codybot/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<StreamEnd, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ChatApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<StreamEnd, ChatApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ChatApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `RunProvider` adapter backed by `chat_api` transport primitives.
pub struct OpenAiChatProvider {
    model: String,
    endpoint: String,
    stream_client: Arc<dyn StreamClient>,
}

impl OpenAiChatProvider {
    /// Creates a provider using real HTTP transport.
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderInitError> {
        let model = sanitize_model(&config.model);
        let client = ChatApiClient::new(config.to_chat_api_config()).map_err(map_init_error)?;
        let endpoint = client.endpoint();

        Ok(Self {
            model,
            endpoint,
            stream_client: Arc::new(DefaultStreamClient { client }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model: sanitize_model(model),
            endpoint: chat_api::normalize_chat_url(DEFAULT_BASE_URL),
            stream_client,
        }
    }
}

impl RunProvider for OpenAiChatProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: OPENAI_PROVIDER_ID.to_string(),
            model_id: self.model.clone(),
            endpoint: Some(self.endpoint.clone()),
        }
    }

    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;

        if cancel.load(Ordering::Acquire) {
            emit(RunEvent::Cancelled { run_id });
            return Ok(());
        }

        let request = ChatRequest::new(self.model.clone(), to_wire_messages(&req.messages));
        debug!(run_id, model = %self.model, messages = request.messages.len(), "starting chat completion");

        let mut on_event = |event: StreamEvent| {
            if let StreamEvent::Token { text } = event {
                emit(RunEvent::Token { run_id, text });
            }
        };

        match self.stream_client.stream(&request, &cancel, &mut on_event) {
            Ok(end) => {
                debug!(run_id, ?end, "chat completion finished");
                emit(RunEvent::Done { run_id });
            }
            Err(ChatApiError::Cancelled) => {
                debug!(run_id, "chat completion cancelled");
                emit(RunEvent::Cancelled { run_id });
            }
            Err(error) => {
                warn!(run_id, %error, "chat completion failed");
                emit(RunEvent::Error {
                    run_id,
                    error: error.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|message| WireMessage::new(message.role.as_str(), message.content.clone()))
        .collect()
}

fn sanitize_model(model: &str) -> String {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: ChatApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize openai provider: {error}"))
}
