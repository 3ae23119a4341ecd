//! Provider adapter implementations.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

// Re-export commonly used provider types
pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use serde_json::{Map, Value};

use crate::error::Error;

/// Merge adapter-specific extra parameters into an object payload. Extras
/// override defaults on key collision.
pub(crate) fn merge_extra_params(payload: &mut Value, extras: Option<&Map<String, Value>>) {
    if let (Value::Object(fields), Some(extras)) = (payload, extras) {
        for (key, value) in extras {
            fields.insert(key.clone(), value.clone());
        }
    }
}

/// Turn a non-2xx response into a provider error carrying the upstream
/// status and body.
pub(crate) async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::provider_status(provider, status.as_u16(), message))
}
