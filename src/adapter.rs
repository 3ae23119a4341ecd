//! The capability set every provider adapter implements.

use crate::chunk_stream::ChunkStream;
use crate::error::Error;
use crate::types::{AdapterCapabilities, AdapterConfig, ChatResponse, Message};

/// A provider adapter: translates the unified message model to and from one
/// provider's wire format and drives that provider's transport.
///
/// Construction (each adapter's `new(config)`) validates provider-specific
/// requirements and fails fast with [`Error::Config`] before any network
/// I/O. Each instance owns one underlying HTTP client for its lifetime and
/// should be released with [`ChatAdapter::close`] when the caller is done
/// with it.
#[async_trait::async_trait]
pub trait ChatAdapter: Send + Sync + std::fmt::Debug {
    /// The configuration this adapter was constructed with.
    fn config(&self) -> &AdapterConfig;

    /// Send a conversation and block until the full answer is available.
    ///
    /// A single round trip bounded by the configured timeout. Transport-level
    /// failures and provider-reported errors surface as [`Error::Provider`].
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, Error>;

    /// Send a conversation and receive the answer as a lazy chunk stream.
    ///
    /// The returned stream is forward-only and consumed at most once. It
    /// terminates after a chunk with `finished == true` or when the
    /// underlying transport closes; a transport error mid-stream aborts the
    /// sequence with an `Err` item rather than truncating it silently.
    /// Dropping the stream before the terminal chunk releases the transport.
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error>;

    /// Best-effort liveness probe. Never errors: internal failures are
    /// captured and reported as `false`.
    async fn health_check(&self) -> bool;

    /// Static capability report. No I/O.
    fn capabilities(&self) -> AdapterCapabilities;

    /// Discover available models. Adapters without a live discovery endpoint
    /// fall back to the static capability report.
    async fn list_models(&self) -> Result<Vec<String>, Error> {
        Ok(self.capabilities().supported_models)
    }

    /// Release the underlying transport. Safe to call multiple times; a
    /// no-op for adapters whose pooled HTTP client is released on drop.
    async fn close(&self) {}
}
