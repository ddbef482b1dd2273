use tracing::trace;

use crate::events::{ChunkPayload, StreamEnd, StreamEvent};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for newline-delimited `data: <json>` streams.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multi-byte UTF-8 sequence. Once a `Done`
/// has been produced the decoder ignores all further input.
#[derive(Debug, Default)]
pub struct SseStreamDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseStreamDecoder {
    /// Feed arbitrary bytes into the decoder and drain events for complete lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&String::from_utf8_lossy(&line), &mut events);

            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        events
    }

    /// Signal end of input.
    ///
    /// A trailing unterminated line is decoded first. If no sentinel or finish
    /// indicator was seen, an orderly [`StreamEnd::Eof`] completion is emitted.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.decode_line(&String::from_utf8_lossy(&rest), &mut events);
        }

        if !self.finished {
            self.finished = true;
            events.push(StreamEvent::Done {
                end: StreamEnd::Eof,
            });
        }

        events
    }

    /// Decode a complete payload string in one shot, including end of input.
    pub fn parse_lines(input: &str) -> Vec<StreamEvent> {
        let mut decoder = Self::default();
        let mut events = decoder.feed(input.as_bytes());
        events.extend(decoder.finish());
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_line(&mut self, raw: &str, events: &mut Vec<StreamEvent>) {
        let line = raw.trim();
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            self.finish_with(StreamEnd::Sentinel, events);
            return;
        }

        let parsed = match serde_json::from_str::<ChunkPayload>(payload) {
            Ok(parsed) => parsed,
            Err(error) => {
                trace!(%error, "skipping undecodable stream frame");
                return;
            }
        };

        for choice in parsed.choices.unwrap_or_default() {
            if let Some(text) = choice
                .delta
                .and_then(|delta| delta.content)
                .filter(|text| !text.is_empty())
            {
                events.push(StreamEvent::Token { text });
            }

            if let Some(reason) = choice.finish_reason.filter(|reason| !reason.is_empty()) {
                self.finish_with(StreamEnd::Finished { reason }, events);
                return;
            }
        }
    }

    fn finish_with(&mut self, end: StreamEnd, events: &mut Vec<StreamEvent>) {
        self.finished = true;
        events.push(StreamEvent::Done { end });
    }
}
