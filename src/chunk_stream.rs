//! Forward-only, single-consumption wrapper around a stream of chunks.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::{Stream, StreamExt};

use crate::error::Error;
use crate::types::StreamChunk;

/// A lazy sequence of [`StreamChunk`]s from one generation.
///
/// Single-pass by construction: consuming it takes ownership, so it cannot
/// be restarted. Once a chunk with `finished == true` has been yielded, or
/// an error has been returned, the stream ends; the producer is never
/// polled again. Dropping the value before the terminal chunk drops the
/// underlying HTTP response and releases the connection.
pub struct ChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<StreamChunk, Error>> + Send>>,
    done: bool,
}

impl ChunkStream {
    /// Wrap a stream of chunk results.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamChunk, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            done: false,
        }
    }

    /// Drain the stream, concatenating the content of every chunk.
    pub async fn collect_content(mut self) -> Result<String, Error> {
        let mut content = String::new();
        while let Some(chunk) = self.next().await {
            content.push_str(&chunk?.content);
        }
        Ok(content)
    }
}

impl Stream for ChunkStream {
    type Item = Result<StreamChunk, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match ready!(self.inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                if chunk.finished {
                    self.done = true;
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                // An error is terminal: the in-flight sequence is aborted,
                // not resumed.
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.done = true;
                Poll::Ready(None)
            }
        }
    }
}
