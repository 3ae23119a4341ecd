//! Byte-level framing adapters for streamed provider responses.
//!
//! Providers frame their streaming payloads one of two ways: Server-Sent
//! Events (blank-line separated `field: value` records) or newline-delimited
//! JSON. Both adapters here buffer partial frames across network chunks and
//! yield only complete units, so a UTF-8 sequence or a frame split across
//! reads reassembles correctly.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::{Stream, StreamExt};
use memchr::{memchr, memmem};

use crate::error::Error;

/// Frames larger than this abort the stream rather than growing the buffer
/// without bound.
const MAX_BUFFER_BYTES: usize = 1_000_000;

/// A Server-Sent Events record.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Value of the `event:` field, when present.
    pub event: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
    /// Value of the `id:` field, when present.
    pub id: Option<String>,
    /// Value of the `retry:` field, when present.
    pub retry: Option<u64>,
}

impl SseEvent {
    /// The `[DONE]` sentinel some providers use to close a stream.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Parses SSE events out of a byte stream.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    ready: VecDeque<SseEvent>,
    inner_done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            ready: VecDeque::new(),
            inner_done: false,
        }
    }

    /// Split complete events off the front of the buffer.
    fn drain_complete_events(&mut self) -> Result<(), Error> {
        let finder = memmem::Finder::new(b"\n\n");
        let mut consumed = 0;

        while let Some(pos) = finder.find(&self.buffer[consumed..]) {
            let frame_end = consumed + pos;
            let frame = std::str::from_utf8(&self.buffer[consumed..frame_end])
                .map_err(|e| Error::streaming(format!("invalid UTF-8 in SSE event: {e}")))?;
            if let Some(event) = parse_sse_frame(frame) {
                self.ready.push_back(event);
            }
            consumed = frame_end + 2;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        Ok(())
    }

    /// Parse whatever remains when the transport closes without a trailing
    /// blank line (seen in the wild with `data: [DONE]` as the last bytes).
    fn drain_trailing_event(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let event = std::str::from_utf8(&self.buffer)
            .ok()
            .and_then(parse_sse_frame);
        self.buffer.clear();
        event
    }
}

/// Parse one complete SSE frame (the text between blank-line separators).
fn parse_sse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines = Vec::new();
    let mut id = None;
    let mut retry = None;

    for line in frame.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value.to_string()),
            "id" => id = Some(value.to_string()),
            "retry" => retry = value.parse().ok(),
            _ => {}
        }
    }

    // A frame with no data lines carries no event.
    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
        id,
        retry,
    })
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.inner_done {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    self.buffer.extend_from_slice(&bytes);
                    if self.buffer.len() > MAX_BUFFER_BYTES {
                        self.buffer.clear();
                        self.inner_done = true;
                        return Poll::Ready(Some(Err(Error::streaming(
                            "SSE frame exceeded maximum buffer size",
                        ))));
                    }
                    if let Err(e) = self.drain_complete_events() {
                        self.inner_done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Some(Err(e)) => {
                    self.inner_done = true;
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "transport error mid-stream: {e}"
                    )))));
                }
                None => {
                    self.inner_done = true;
                    if let Some(event) = self.drain_trailing_event() {
                        return Poll::Ready(Some(Ok(event)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Parses newline-delimited frames (one JSON object per line) out of a byte
/// stream. Empty lines are dropped; line content is not interpreted here.
pub struct JsonLinesStream<S> {
    inner: S,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    inner_done: bool,
}

impl<S> JsonLinesStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            ready: VecDeque::new(),
            inner_done: false,
        }
    }

    fn drain_complete_lines(&mut self) -> Result<(), Error> {
        let mut consumed = 0;
        while let Some(pos) = memchr(b'\n', &self.buffer[consumed..]) {
            let line_end = consumed + pos;
            let line = std::str::from_utf8(&self.buffer[consumed..line_end])
                .map_err(|e| Error::streaming(format!("invalid UTF-8 in stream line: {e}")))?
                .trim_end_matches('\r');
            if !line.trim().is_empty() {
                self.ready.push_back(line.to_string());
            }
            consumed = line_end + 1;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        Ok(())
    }

    fn drain_trailing_line(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::str::from_utf8(&self.buffer)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.buffer.clear();
        line
    }
}

impl<S, E> Stream for JsonLinesStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if self.inner_done {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    self.buffer.extend_from_slice(&bytes);
                    if self.buffer.len() > MAX_BUFFER_BYTES {
                        self.buffer.clear();
                        self.inner_done = true;
                        return Poll::Ready(Some(Err(Error::streaming(
                            "stream line exceeded maximum buffer size",
                        ))));
                    }
                    if let Err(e) = self.drain_complete_lines() {
                        self.inner_done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Some(Err(e)) => {
                    self.inner_done = true;
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "transport error mid-stream: {e}"
                    )))));
                }
                None => {
                    self.inner_done = true;
                    if let Some(line) = self.drain_trailing_line() {
                        return Poll::Ready(Some(Ok(line)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}
