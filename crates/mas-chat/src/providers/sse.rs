//! Minimal server-sent-events decoding over a chunked response body.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::errors::{ChatError, ChatResult, TransportError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental decoder: feed it body chunks, collect complete events.
/// Chunk boundaries may fall anywhere, including inside a line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.line(line.trim_end_matches(&['\n', '\r'][..])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Decode a response body into events. Each read must arrive within `idle_timeout`.
pub fn events<S, E>(body: S, idle_timeout: Duration) -> BoxStream<'static, ChatResult<SseEvent>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::default();
        loop {
            match tokio::time::timeout(idle_timeout, body.next()).await {
                Err(_) => {
                    yield Err(ChatError::Timeout(idle_timeout));
                    return;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    let e: TransportError = e.into();
                    yield Err(ChatError::from(e));
                    return;
                }
                Ok(Some(Ok(chunk))) => {
                    for event in decoder.push(&chunk) {
                        yield Ok(event);
                    }
                }
            }
        }
        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    }
    .boxed()
}
