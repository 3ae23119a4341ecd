use thiserror::Error;

/// Errors that can occur when using the omnillm library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider {
        provider: String,
        /// Upstream HTTP status, when the failure came from a non-2xx response.
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn provider_status(
        provider: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Error::Provider {
            provider: provider.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn unsupported_provider(provider: impl Into<String>) -> Self {
        Error::UnsupportedProvider(provider.into())
    }
}
