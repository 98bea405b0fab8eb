//! Decoding of transformation service response bodies into chunks.
//!
//! Two body formats are understood:
//! - Server-Sent Events (`text/event-stream`), where each `data:` payload is a
//!   JSON event: `{"type":"delta","text":"..."}`, `{"type":"done"}`,
//!   `{"type":"error","message":"..."}`, `{"type":"ping"}`, or the literal
//!   `[DONE]`. The stream must end with a completion signal.
//! - Raw chunked text (anything else), where every body fragment is a chunk
//!   and closing the connection ends the stream.

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

use crate::domain::errors::TransformError;
use crate::domain::models::session::Chunk;

type ByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Event carried in the `data:` field of an SSE message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Next fragment of transformed text
    Delta { text: String },
    /// Keepalive
    Ping,
    /// End of stream
    Done,
    /// The backend failed mid-stream
    Error { message: String },
}

/// Parse one SSE message block (the text between two blank lines).
///
/// Returns `None` for blocks without data (comments, bare `event:` lines).
pub fn parse_sse_event(block: &str) -> Option<Result<StreamEvent, TransformError>> {
    let data_lines: Vec<&str> = block
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim() == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }

    Some(serde_json::from_str::<StreamEvent>(&data).map_err(|err| {
        warn!(error = %err, data = %data, "Failed to parse SSE event");
        TransformError::Protocol(format!("invalid event payload: {err}"))
    }))
}

/// Incremental UTF-8 decoder that holds back sequences split across frames.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &[u8]) -> Result<String, TransformError> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_owned();
                self.pending.clear();
                Ok(text)
            }
            // incomplete sequence at the end: keep it for the next frame
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                Ok(text)
            }
            Err(err) => Err(TransformError::Protocol(format!(
                "invalid UTF-8 in stream: {err}"
            ))),
        }
    }

    pub fn finish(&self) -> Result<(), TransformError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(TransformError::Protocol(
                "stream ended inside a UTF-8 sequence".to_string(),
            ))
        }
    }
}

/// Chunk stream over a Server-Sent Events body
pub struct SseChunkStream {
    inner: ByteStream,
    decoder: Utf8Decoder,
    buffer: String,
    inner_done: bool,
    finished: bool,
}

impl SseChunkStream {
    pub fn new(byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: byte_stream.boxed(),
            decoder: Utf8Decoder::default(),
            buffer: String::new(),
            inner_done: false,
            finished: false,
        }
    }

    /// Stop and drop the body so the connection is released
    fn finish(&mut self) {
        self.finished = true;
        self.inner_done = true;
        self.inner = stream::empty().boxed();
        self.buffer.clear();
    }

    fn next_block(&mut self) -> Option<String> {
        let end = self.buffer.find("\n\n")?;
        let block = self.buffer[..end].to_string();
        self.buffer.drain(..end + 2);
        Some(block)
    }
}

impl Stream for SseChunkStream {
    type Item = Result<Chunk, TransformError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some(block) = this.next_block() {
                match parse_sse_event(&block) {
                    None | Some(Ok(StreamEvent::Ping)) => continue,
                    Some(Ok(StreamEvent::Delta { text })) => {
                        if text.is_empty() {
                            continue;
                        }
                        return Poll::Ready(Some(Ok(Chunk::from(text))));
                    }
                    Some(Ok(StreamEvent::Done)) => {
                        debug!("Stream completion signal received");
                        this.finish();
                        return Poll::Ready(None);
                    }
                    Some(Ok(StreamEvent::Error { message })) => {
                        this.finish();
                        return Poll::Ready(Some(Err(TransformError::Backend(message))));
                    }
                    Some(Err(err)) => {
                        this.finish();
                        return Poll::Ready(Some(Err(err)));
                    }
                }
            }

            if this.inner_done {
                // a trailing event without its blank line still counts
                if !this.buffer.trim().is_empty() {
                    this.buffer.push_str("\n\n");
                    continue;
                }
                this.finish();
                return Poll::Ready(Some(Err(TransformError::Protocol(
                    "stream closed before the completion signal".to_string(),
                ))));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.decoder.push(&bytes) {
                    Ok(text) => this.buffer.push_str(&text.replace('\r', "")),
                    Err(err) => {
                        this.finish();
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                Poll::Ready(Some(Err(err))) => {
                    this.finish();
                    return Poll::Ready(Some(Err(TransformError::from(err))));
                }
                Poll::Ready(None) => {
                    this.inner_done = true;
                    if let Err(err) = this.decoder.finish() {
                        this.finish();
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Chunk stream over a raw chunked text body
pub struct TextChunkStream {
    inner: ByteStream,
    decoder: Utf8Decoder,
    finished: bool,
}

impl TextChunkStream {
    pub fn new(byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: byte_stream.boxed(),
            decoder: Utf8Decoder::default(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.inner = stream::empty().boxed();
    }
}

impl Stream for TextChunkStream {
    type Item = Result<Chunk, TransformError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.decoder.push(&bytes) {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => return Poll::Ready(Some(Ok(Chunk::from(text)))),
                    Err(err) => {
                        this.finish();
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                Poll::Ready(Some(Err(err))) => {
                    this.finish();
                    return Poll::Ready(Some(Err(TransformError::from(err))));
                }
                Poll::Ready(None) => {
                    let outcome = this.decoder.finish();
                    this.finish();
                    return Poll::Ready(outcome.err().map(Err));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
