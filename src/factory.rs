//! Resolving provider names to live adapter instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::ChatAdapter;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::providers::{AnthropicAdapter, GeminiAdapter, OllamaAdapter, OpenAiAdapter};
use crate::settings::SettingsResolver;
use crate::types::AdapterConfig;

/// Constructs an adapter from a finished configuration. Registered per
/// provider name; runs the adapter's own validation.
pub type AdapterCtor =
    Arc<dyn Fn(AdapterConfig) -> Result<Box<dyn ChatAdapter>, Error> + Send + Sync>;

/// Maps provider names to adapter constructors.
///
/// The registry is an owned value, injected where needed rather than shared
/// through a global, so tests and independent callers cannot bleed
/// registrations into each other. Settings and credential lookup are
/// likewise injected collaborators.
pub struct AdapterFactory {
    registry: BTreeMap<String, AdapterCtor>,
    resolver: Arc<dyn SettingsResolver>,
    credentials: Arc<dyn CredentialStore>,
}

impl AdapterFactory {
    /// An empty factory with no registered providers.
    pub fn new(resolver: Arc<dyn SettingsResolver>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            registry: BTreeMap::new(),
            resolver,
            credentials,
        }
    }

    /// A factory with the four built-in providers registered.
    pub fn with_builtin_providers(
        resolver: Arc<dyn SettingsResolver>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let mut factory = Self::new(resolver, credentials);
        factory.register("openai", Arc::new(|config| {
            Ok(Box::new(OpenAiAdapter::new(config)?) as Box<dyn ChatAdapter>)
        }));
        factory.register("anthropic", Arc::new(|config| {
            Ok(Box::new(AnthropicAdapter::new(config)?) as Box<dyn ChatAdapter>)
        }));
        factory.register("gemini", Arc::new(|config| {
            Ok(Box::new(GeminiAdapter::new(config)?) as Box<dyn ChatAdapter>)
        }));
        factory.register("ollama", Arc::new(|config| {
            Ok(Box::new(OllamaAdapter::new(config)?) as Box<dyn ChatAdapter>)
        }));
        factory
    }

    /// Register a constructor for a provider name. Registering an existing
    /// name replaces the previous constructor.
    pub fn register(&mut self, name: impl Into<String>, ctor: AdapterCtor) {
        self.registry.insert(name.into(), ctor);
    }

    /// Registered provider names, in stable sorted order.
    pub fn supported_providers(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// Create an adapter for `provider`.
    ///
    /// When `config` is omitted it is resolved through the injected settings
    /// resolver; `model` overrides the configured model; a missing API key
    /// is filled from the injected credential store before construction.
    /// Unregistered names fail with [`Error::UnsupportedProvider`] without
    /// constructing anything.
    pub fn create(
        &self,
        provider: &str,
        config: Option<AdapterConfig>,
        model: Option<&str>,
    ) -> Result<Box<dyn ChatAdapter>, Error> {
        let ctor = self.registry.get(provider).ok_or_else(|| {
            Error::unsupported_provider(format!(
                "{provider}. Supported: {:?}",
                self.supported_providers()
            ))
        })?;

        let mut config = match config {
            Some(config) => config,
            None => self
                .resolver
                .resolve(provider)
                .ok_or_else(|| {
                    Error::config(format!("no settings available for provider '{provider}'"))
                })?
                .into_config(provider)?,
        };

        if let Some(model) = model {
            config.model = model.to_string();
        }
        if config.api_key.is_none() {
            config.api_key = self.credentials.api_key_for(provider);
        }

        ctor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::settings::{ProviderSettings, StaticSettings};

    fn factory() -> AdapterFactory {
        let resolver = StaticSettings::new()
            .insert(
                "ollama",
                ProviderSettings::new("http://localhost:11434").with_model("llama3"),
            )
            .insert(
                "openai",
                ProviderSettings::new("https://api.openai.com/v1").with_model("gpt-4"),
            );
        let credentials = StaticCredentials::new().insert("openai", "sk-test");
        AdapterFactory::with_builtin_providers(Arc::new(resolver), Arc::new(credentials))
    }

    #[test]
    fn test_supported_providers_sorted() {
        assert_eq!(
            factory().supported_providers(),
            vec!["anthropic", "gemini", "ollama", "openai"]
        );
    }

    #[test]
    fn test_unsupported_provider() {
        let err = factory().create("nonexistent", None, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(_)));
    }

    #[test]
    fn test_create_resolves_settings_and_credentials() {
        let adapter = factory().create("openai", None, None).unwrap();
        assert_eq!(adapter.config().api_key.as_deref(), Some("sk-test"));
        assert_eq!(adapter.config().model, "gpt-4");
    }

    #[test]
    fn test_model_override() {
        let adapter = factory()
            .create("openai", None, Some("gpt-3.5-turbo"))
            .unwrap();
        assert_eq!(adapter.config().model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_missing_credential_fails_before_network() {
        // Anthropic requires a key; neither settings nor credentials supply
        // one, so construction fails synchronously.
        let resolver = StaticSettings::new().insert(
            "anthropic",
            ProviderSettings::new("https://api.anthropic.com")
                .with_model("claude-3-haiku-20240307"),
        );
        let factory = AdapterFactory::with_builtin_providers(
            Arc::new(resolver),
            Arc::new(StaticCredentials::new()),
        );

        let err = factory.create("anthropic", None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_settings_is_config_error() {
        let err = factory().create("gemini", None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
