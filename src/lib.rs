//! A unified adapter layer over multiple LLM providers.
//!
//! This library provides one consistent API for chatting with OpenAI-style,
//! Anthropic-style and Gemini-style hosted backends as well as a local
//! Ollama server, with support for buffered and streamed responses.
//!
//! A conversation goes through three pieces: an [`AdapterFactory`] resolves
//! a provider name plus configuration to a live [`ChatAdapter`]; the
//! adapter's `chat`/`chat_stream` translate the unified [`Message`] model to
//! the provider's wire format and back; the caller consumes one
//! [`ChatResponse`] or a [`ChunkStream`] of [`StreamChunk`]s and then
//! releases the adapter with `close`.

pub mod adapter;
pub mod chunk_stream;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod framing;
pub mod harness;
pub mod providers;
pub mod settings;
pub mod types;

// Re-export core types for easy usage
pub use adapter::ChatAdapter;
pub use chunk_stream::ChunkStream;
pub use credentials::{CredentialStore, EnvCredentials, StaticCredentials};
pub use error::Error;
pub use factory::{AdapterCtor, AdapterFactory};
pub use framing::SseEvent;
pub use harness::{ProbeHarness, ProbeReport, ProbeStatus, ProbeSummary};
pub use providers::*;
pub use settings::{ProviderSettings, SettingsResolver, StaticSettings};
pub use types::*;
