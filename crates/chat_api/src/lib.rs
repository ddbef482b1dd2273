//! Transport-only client primitives for OpenAI-compatible chat completions.
//!
//! This crate owns request building, the incremental `data:` line decoder and
//! the streaming HTTP loop. It has no session state and no UI coupling: callers
//! hand it a message snapshot and receive decoded [`StreamEvent`]s.
//!
//! Orderly end of stream and transport failure are distinguished by type:
//! a stream that ends returns [`StreamEnd`], a broken one returns
//! [`ChatApiError::Transport`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient, ERROR_BODY_LIMIT};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{StreamEnd, StreamEvent};
pub use payload::{ChatRequest, WireMessage, DEFAULT_TEMPERATURE};
pub use sse::SseStreamDecoder;
pub use url::{is_loopback_endpoint, normalize_chat_url, DEFAULT_BASE_URL};
