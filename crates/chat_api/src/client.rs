use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::ChatApiConfig;
use crate::error::{error_body_text, ChatApiError};
use crate::events::{StreamEnd, StreamEvent};
use crate::headers::build_headers;
use crate::payload::ChatRequest;
use crate::sse::SseStreamDecoder;
use crate::url::{is_loopback_endpoint, normalize_chat_url};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Maximum number of error-body bytes kept for a non-success response.
pub const ERROR_BODY_LIMIT: usize = 8 * 1024;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoint = normalize_chat_url(&config.base_url);
        reqwest::Url::parse(&endpoint)
            .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{endpoint}: {error}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if is_loopback_endpoint(&endpoint) {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(ChatApiError::Client)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        normalize_chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config) {
            let name =
                HeaderName::from_bytes(key.as_bytes()).map_err(|error| ChatApiError::InvalidHeader {
                    key: key.clone(),
                    reason: error.to_string(),
                })?;
            let value = HeaderValue::from_str(&value).map_err(|error| {
                ChatApiError::InvalidHeader {
                    key: key.clone(),
                    reason: error.to_string(),
                }
            })?;
            out.insert(name, value);
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        let body = serde_json::to_vec(&payload)?;

        Ok(self.http.post(self.endpoint()).headers(headers).body(body))
    }

    /// Sends the request once. Non-success statuses become
    /// [`ChatApiError::Status`] carrying a body capped at [`ERROR_BODY_LIMIT`].
    pub async fn send(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        let pending = self.build_request(request)?.send();
        let response = await_or_cancel(pending, cancellation)
            .await?
            .map_err(ChatApiError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = read_capped_body(response, ERROR_BODY_LIMIT, cancellation).await?;
        Err(ChatApiError::Status {
            status,
            body: error_body_text(&body),
        })
    }

    /// Streams one completion, handing every decoded event to `on_event` as
    /// soon as it is decoded.
    ///
    /// The final event passed to `on_event` is always a `Done`, and its end
    /// reason is returned. Errors are returned without a `Done`.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<StreamEnd, ChatApiError>
    where
        F: FnMut(StreamEvent),
    {
        let response = self.send(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut decoder = SseStreamDecoder::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            let chunk = chunk.map_err(ChatApiError::Transport)?;
            if let Some(end) = forward_events(decoder.feed(&chunk), &mut on_event) {
                return Ok(end);
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        debug!("chat completion body closed without terminal frame");
        Ok(forward_events(decoder.finish(), &mut on_event).unwrap_or(StreamEnd::Eof))
    }
}

fn forward_events<F>(events: Vec<StreamEvent>, on_event: &mut F) -> Option<StreamEnd>
where
    F: FnMut(StreamEvent),
{
    for event in events {
        let end = match &event {
            StreamEvent::Done { end } => Some(end.clone()),
            StreamEvent::Token { .. } => None,
        };
        on_event(event);
        if end.is_some() {
            return end;
        }
    }

    None
}

async fn read_capped_body(
    response: Response,
    limit: usize,
    cancellation: Option<&CancellationSignal>,
) -> Result<Vec<u8>, ChatApiError> {
    let mut body = Vec::new();
    let mut bytes = response.bytes_stream();

    while body.len() < limit {
        match await_or_cancel(bytes.next(), cancellation).await? {
            Some(Ok(chunk)) => body.extend_from_slice(&chunk),
            // A broken error body still leaves the status worth reporting.
            Some(Err(_)) | None => break,
        }
    }

    body.truncate(limit);
    Ok(body)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
