use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for one adapter instance.
///
/// `base_url` and `model` are mandatory and therefore positional in
/// [`AdapterConfig::new`]; everything else has a default and is set through
/// the `with_*` builders. The value is immutable for the lifetime of the
/// adapter it is handed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout_seconds: u64,
    /// Provider-specific request parameters that have no unified slot. Merged
    /// into the outgoing payload, overriding defaults on key collision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<Map<String, Value>>,
}

impl AdapterConfig {
    /// Create a configuration with the mandatory fields.
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            extra_params: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Add one provider-specific parameter.
    pub fn with_extra_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// Token usage reported by a provider.
///
/// Counters a provider does not report default to zero so arithmetic over
/// usage never has to deal with missing values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from prompt/completion counts, computing the total.
    pub fn from_parts(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Static descriptor of what an adapter supports. No I/O is performed to
/// produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub provider: String,
    pub supports_streaming: bool,
    pub supports_tools: bool,
    pub supports_function_calling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_length: Option<u32>,
    pub supported_models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AdapterConfig::new("openai", "https://api.openai.com/v1", "gpt-4");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.api_key.is_none());
        assert!(config.max_tokens.is_none());
        assert!(config.extra_params.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = AdapterConfig::new("ollama", "http://localhost:11434", "llama3")
            .with_temperature(0.2)
            .with_max_tokens(256)
            .with_timeout_seconds(5)
            .with_extra_param("seed", serde_json::json!(42));

        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(
            config.extra_params.as_ref().unwrap().get("seed"),
            Some(&serde_json::json!(42))
        );
    }

    #[test]
    fn test_usage_from_parts() {
        let usage = Usage::from_parts(10, 5);
        assert_eq!(usage.total_tokens, 15);

        let empty = Usage::default();
        assert_eq!(empty.total_tokens, 0);
    }
}
