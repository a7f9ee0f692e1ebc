//! Incremental Server-Sent Events decoding for chat completion streams.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use tracing::warn;

use rag_core::{RagError, Result, TokenStream};

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line.
    Data(String),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Splits a byte stream into SSE frames.
///
/// Bytes are buffered until a full line is available, so frames and UTF-8
/// sequences may be split across network chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every frame completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = Self::parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the byte stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_line(&String::from_utf8_lossy(&rest))
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data.to_string()))
        }
    }
}

/// Extract the content delta from a chat completion chunk.
///
/// Returns `Ok(None)` for chunks without text (role headers, usage frames,
/// malformed JSON) and an error when the server reports one mid-stream.
pub fn parse_delta(data: &str) -> Result<Option<String>> {
    let json: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            let preview: String = data.chars().take(200).collect();
            warn!(error = %e, data_preview = %preview, "Failed to parse SSE JSON chunk");
            return Ok(None);
        }
    };

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(RagError::streaming(message));
    }

    Ok(json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

struct StreamState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    pending_error: Option<RagError>,
    done: bool,
}

impl StreamState {
    /// Queue the text of each frame; stop at `[DONE]`.
    fn absorb(&mut self, events: impl IntoIterator<Item = SseEvent>) -> Result<()> {
        for event in events {
            match event {
                SseEvent::Done => {
                    self.done = true;
                    break;
                }
                SseEvent::Data(data) => {
                    if let Some(text) = parse_delta(&data)? {
                        self.pending.push_back(text);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turn a raw SSE byte stream into a stream of text chunks.
///
/// Nothing is spawned: bytes are read only when the caller polls for the
/// next chunk.
pub fn token_stream<S>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        pending_error: None,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            // text decoded before a failing frame is delivered first
            if let Some(e) = state.pending_error.take() {
                return Some((Err(e), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    if let Err(e) = state.absorb(events) {
                        state.done = true;
                        state.pending_error = Some(e);
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    let tail = state.decoder.finish();
                    state.done = true;
                    if let Err(e) = state.absorb(tail) {
                        state.pending_error = Some(e);
                    }
                }
            }
        }
    }))
}
