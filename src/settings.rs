//! The configuration collaborator boundary.
//!
//! The core never reads files or the environment for settings; it receives
//! resolved per-provider settings through a [`SettingsResolver`] injected
//! into the factory. File or YAML loading lives outside the core and hands
//! its result to [`StaticSettings`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::types::AdapterConfig;

/// Resolved settings for one provider, as supplied by the external
/// configuration collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<Map<String, Value>>,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build the unified adapter configuration for `provider`. A model must
    /// be present, either here or as a caller-supplied override.
    pub fn into_config(self, provider: &str) -> Result<AdapterConfig, Error> {
        let model = self
            .model
            .ok_or_else(|| Error::config(format!("no model configured for provider '{provider}'")))?;

        let mut config = AdapterConfig::new(provider, self.base_url, model);
        config.api_key = self.api_key;
        config.extra_params = self.extra_params;
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = Some(max_tokens);
        }
        if let Some(timeout_seconds) = self.timeout_seconds {
            config.timeout_seconds = timeout_seconds;
        }
        Ok(config)
    }
}

/// Resolves a provider name to its settings.
pub trait SettingsResolver: Send + Sync {
    fn resolve(&self, provider: &str) -> Option<ProviderSettings>;
}

/// A map-backed resolver, the in-crate implementation callers populate from
/// whatever configuration source they use.
#[derive(Debug, Default)]
pub struct StaticSettings {
    entries: HashMap<String, ProviderSettings>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, provider: impl Into<String>, settings: ProviderSettings) -> Self {
        self.entries.insert(provider.into(), settings);
        self
    }
}

impl SettingsResolver for StaticSettings {
    fn resolve(&self, provider: &str) -> Option<ProviderSettings> {
        self.entries.get(provider).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_config_applies_overrides() {
        let config = ProviderSettings::new("http://localhost:11434")
            .with_model("llama3")
            .with_temperature(0.1)
            .with_timeout_seconds(120)
            .into_config("ollama")
            .unwrap();

        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.timeout_seconds, 120);
        // Unset fields keep the unified defaults.
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_into_config_requires_model() {
        let err = ProviderSettings::new("https://api.openai.com/v1")
            .into_config("openai")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_static_settings_resolution() {
        let resolver = StaticSettings::new().insert(
            "gemini",
            ProviderSettings::new("https://generativelanguage.googleapis.com/v1")
                .with_model("gemini-pro"),
        );

        assert!(resolver.resolve("gemini").is_some());
        assert!(resolver.resolve("openai").is_none());
    }
}
