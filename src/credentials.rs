//! Credential lookup, injected into the factory instead of read from
//! ambient process state.

use std::collections::HashMap;

/// Supplies an API key for a provider name. "No credential available" is a
/// construction-time failure for providers that require one.
pub trait CredentialStore: Send + Sync {
    fn api_key_for(&self, provider: &str) -> Option<String>;
}

/// An in-memory credential store with explicit scope and lifetime.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, provider: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.keys.insert(provider.into(), api_key.into());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn api_key_for(&self, provider: &str) -> Option<String> {
        self.keys.get(provider).cloned()
    }
}

/// Reads `{PROVIDER}_API_KEY` from the process environment. Read-only: the
/// environment is never mutated.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialStore for EnvCredentials {
    fn api_key_for(&self, provider: &str) -> Option<String> {
        let var = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));
        std::env::var(var).ok().filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials_lookup() {
        let store = StaticCredentials::new().insert("openai", "sk-test");
        assert_eq!(store.api_key_for("openai").as_deref(), Some("sk-test"));
        assert!(store.api_key_for("anthropic").is_none());
    }

    #[test]
    fn test_env_credentials_variable_name() {
        // A provider name nobody sets: lookup misses rather than panics.
        assert!(EnvCredentials::new()
            .api_key_for("no-such-provider-xyz")
            .is_none());
    }
}
