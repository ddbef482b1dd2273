use serde::Deserialize;

/// How a successfully decoded stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The `data: [DONE]` sentinel was received.
    Sentinel,
    /// A choice carried a non-empty `finish_reason`.
    Finished { reason: String },
    /// The server closed the body without a sentinel or finish indicator.
    Eof,
}

/// Event produced by [`crate::SseStreamDecoder`].
///
/// A decoder yields zero or more `Token`s followed by exactly one `Done`.
/// Failures are never decoder events; they surface as
/// [`crate::ChatApiError`] from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token { text: String },
    Done { end: StreamEnd },
}

impl StreamEvent {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// One `data:` payload of a streamed chat completion.
///
/// Every field tolerates `null` or absence so that partially populated
/// frames from different servers still decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ChunkPayload {
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}
