//! API key resolution for the chat-completion endpoint.
//!
//! The key is looked up in order, first match wins:
//! 1. the configured environment variable (`OPENAI_API_KEY` by default);
//! 2. credential stores, in registration order:
//!    - `SecretsFileStore`: a TOML file mapping key names to secrets;
//!    - `KeyringCredentialStore`: the OS-native credential store.
//!
//! `InMemoryCredentialStore` exists for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::config::LlmConfig;
use crate::error::CredentialError;

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Short backend name for log lines.
    fn name(&self) -> &str;

    /// Retrieve the secret stored under `key`.
    fn get_key(&self, key: &str) -> Result<String, CredentialError>;

    /// Check whether a secret exists under `key`.
    fn has_key(&self, key: &str) -> bool {
        self.get_key(key).is_ok()
    }
}

/// OS-native credential store using the `keyring` crate.
///
/// Entries live under service `"chartsmith"` with the configured account name.
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            service: "chartsmith".to_string(),
            account: account.into(),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn name(&self) -> &str {
        "keyring"
    }

    /// The keyring entry is addressed by the configured account; `key` is
    /// ignored so the same resolver call works for every backend.
    fn get_key(&self, _key: &str) -> Result<String, CredentialError> {
        let entry = keyring::Entry::new(&self.service, &self.account).map_err(|e| {
            CredentialError::BackendUnavailable {
                message: e.to_string(),
            }
        })?;
        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => CredentialError::NotFound {
                service: self.service.clone(),
                account: self.account.clone(),
            },
            other => CredentialError::BackendUnavailable {
                message: other.to_string(),
            },
        })
    }
}

/// Secrets stored as top-level string values in a TOML file:
///
/// ```toml
/// OPENAI_API_KEY = "sk-your-key-here"
/// ```
///
/// The file is re-read on every lookup so edits apply without a restart.
pub struct SecretsFileStore {
    path: PathBuf,
}

impl SecretsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table, CredentialError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CredentialError::NotFound {
                    service: "secrets-file".to_string(),
                    account: self.path.display().to_string(),
                }
            } else {
                CredentialError::SecretsFile {
                    path: self.path.clone(),
                    message: e.to_string(),
                }
            }
        })?;
        text.parse::<toml::Table>()
            .map_err(|e| CredentialError::SecretsFile {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }
}

impl CredentialStore for SecretsFileStore {
    fn name(&self) -> &str {
        "secrets-file"
    }

    fn get_key(&self, key: &str) -> Result<String, CredentialError> {
        let table = self.read_table()?;
        table
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| CredentialError::NotFound {
                service: "secrets-file".to_string(),
                account: key.to_string(),
            })
    }
}

/// In-memory credential store for testing.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    store: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: &str, secret: &str) -> Self {
        let store = Self::new();
        store.insert(key, secret);
        store
    }

    pub fn insert(&self, key: &str, secret: &str) {
        if let Ok(mut map) = self.store.lock() {
            map.insert(key.to_string(), secret.to_string());
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_key(&self, key: &str) -> Result<String, CredentialError> {
        self.store
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
            .ok_or_else(|| CredentialError::NotFound {
                service: "memory".to_string(),
                account: key.to_string(),
            })
    }
}

/// Resolves the chat API key from the environment, then from stores.
pub struct CredentialResolver {
    env_var: String,
    stores: Vec<Box<dyn CredentialStore>>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("env_var", &self.env_var)
            .field(
                "stores",
                &self.stores.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CredentialResolver {
    /// Resolver that only consults the given environment variable.
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            stores: Vec::new(),
        }
    }

    /// Append a fallback store; stores are consulted in insertion order.
    pub fn with_store(mut self, store: Box<dyn CredentialStore>) -> Self {
        self.stores.push(store);
        self
    }

    /// Build the resolver described by the LLM configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut resolver = Self::new(config.api_key_env.clone());
        if let Some(path) = &config.secrets_file {
            resolver = resolver.with_store(Box::new(SecretsFileStore::new(path.clone())));
        }
        if let Some(account) = &config.credential_store_key {
            resolver = resolver.with_store(Box::new(KeyringCredentialStore::new(account.clone())));
        }
        resolver
    }

    /// Name of the environment variable consulted first.
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Return the first non-empty key, or `None` when every source misses.
    pub fn resolve(&self) -> Option<String> {
        if let Ok(value) = std::env::var(&self.env_var)
            && !value.trim().is_empty()
        {
            return Some(value);
        }
        for store in &self.stores {
            match store.get_key(&self.env_var) {
                Ok(value) if !value.trim().is_empty() => {
                    debug!(store = store.name(), "API key resolved from credential store");
                    return Some(value);
                }
                Ok(_) => {}
                Err(CredentialError::NotFound { .. }) => {}
                Err(e) => debug!(store = store.name(), error = %e, "Credential store lookup failed"),
            }
        }
        None
    }

    pub fn has_key(&self) -> bool {
        self.resolve().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const UNSET_VAR: &str = "CHARTSMITH_TEST_UNSET_KEY_VAR";

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryCredentialStore::with_key("OPENAI_API_KEY", "sk-test-123");
        assert_eq!(store.get_key("OPENAI_API_KEY").unwrap(), "sk-test-123");
        assert!(store.has_key("OPENAI_API_KEY"));
        assert!(matches!(
            store.get_key("OTHER").unwrap_err(),
            CredentialError::NotFound { .. }
        ));
    }

    #[test]
    fn test_secrets_file_store_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "OPENAI_API_KEY = \"sk-from-file\"").unwrap();
        let store = SecretsFileStore::new(file.path());
        assert_eq!(store.get_key("OPENAI_API_KEY").unwrap(), "sk-from-file");
        assert!(!store.has_key("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_secrets_file_missing_is_not_found() {
        let store = SecretsFileStore::new("/nonexistent/secrets.toml");
        assert!(matches!(
            store.get_key("OPENAI_API_KEY").unwrap_err(),
            CredentialError::NotFound { .. }
        ));
    }

    #[test]
    fn test_secrets_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        let store = SecretsFileStore::new(file.path());
        assert!(matches!(
            store.get_key("OPENAI_API_KEY").unwrap_err(),
            CredentialError::SecretsFile { .. }
        ));
    }

    #[test]
    fn test_resolver_without_sources_is_empty() {
        let resolver = CredentialResolver::new(UNSET_VAR);
        assert!(resolver.resolve().is_none());
        assert!(!resolver.has_key());
    }

    #[test]
    fn test_resolver_falls_back_to_stores_in_order() {
        let resolver = CredentialResolver::new(UNSET_VAR)
            .with_store(Box::new(InMemoryCredentialStore::new()))
            .with_store(Box::new(InMemoryCredentialStore::with_key(
                UNSET_VAR, "sk-second",
            )))
            .with_store(Box::new(InMemoryCredentialStore::with_key(
                UNSET_VAR, "sk-third",
            )));
        assert_eq!(resolver.resolve().as_deref(), Some("sk-second"));
    }

    #[test]
    fn test_resolver_skips_blank_values() {
        let resolver = CredentialResolver::new(UNSET_VAR)
            .with_store(Box::new(InMemoryCredentialStore::with_key(UNSET_VAR, "  ")))
            .with_store(Box::new(InMemoryCredentialStore::with_key(
                UNSET_VAR, "sk-real",
            )));
        assert_eq!(resolver.resolve().as_deref(), Some("sk-real"));
    }

    #[test]
    fn test_resolver_env_wins_over_store() {
        let var = "CHARTSMITH_TEST_ENV_WINS_KEY";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(var, "sk-from-env") };
        let resolver = CredentialResolver::new(var).with_store(Box::new(
            InMemoryCredentialStore::with_key(var, "sk-from-store"),
        ));
        assert_eq!(resolver.resolve().as_deref(), Some("sk-from-env"));
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn test_from_config_registers_secrets_file() {
        let config = LlmConfig {
            api_key_env: UNSET_VAR.to_string(),
            ..LlmConfig::default()
        };
        let resolver = CredentialResolver::from_config(&config);
        assert_eq!(resolver.env_var(), UNSET_VAR);
        let debug = format!("{resolver:?}");
        assert!(debug.contains("secrets-file"));
        assert!(!debug.contains("keyring"));
    }
}
