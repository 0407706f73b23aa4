//! Configuration system for Chartsmith.
//!
//! Uses `figment` for layered configuration:
//! defaults -> user config file -> explicit config file -> environment.
//! The user-level file lives at `~/.config/chartsmith/config.toml` (platform
//! dependent, via `directories`). Environment variables use the `CHARTSMITH_`
//! prefix with `__` separating nested keys, e.g. `CHARTSMITH_LLM__MODEL`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP server binding for the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Idle sessions older than this are dropped from memory.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_ttl_secs: 3600,
        }
    }
}

/// Instant-answer search endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// How many entries of `RelatedTopics` are considered.
    pub related_topics_limit: usize,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.duckduckgo.com/".to_string(),
            timeout_secs: 10,
            related_topics_limit: 3,
            user_agent: format!("Chartsmith/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key; also the key name looked
    /// up in the secrets file.
    pub api_key_env: String,
    /// Optional TOML secrets file consulted when the env var is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
    /// Optional OS keyring entry name consulted last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_store_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-1106-preview".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
            secrets_file: Some(PathBuf::from(".chartsmith/secrets.toml")),
            credential_store_key: None,
        }
    }
}

/// Behaviour of the research -> code hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fail the run before code generation when the research text lacks
    /// any of the four requested sections.
    pub require_structured_research: bool,
    /// Characters of the query kept in the download file name.
    pub download_prefix_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            require_structured_research: false,
            download_prefix_chars: 20,
        }
    }
}

impl AppConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }
        if self.search.timeout_secs == 0 {
            return Err(invalid("search.timeout_secs must be positive"));
        }
        if self.search.related_topics_limit == 0 {
            return Err(invalid("search.related_topics_limit must be at least 1"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs must be positive"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature must be within [0, 2]"));
        }
        if self.llm.max_tokens == 0 {
            return Err(invalid("llm.max_tokens must be positive"));
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(invalid("llm.api_key_env must name an environment variable"));
        }
        if self.pipeline.download_prefix_chars == 0 {
            return Err(invalid("pipeline.download_prefix_chars must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

/// Path of the user-level config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "chartsmith", "chartsmith")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from all layers and validate it.
///
/// `explicit` is a file passed on the command line; it must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("CHARTSMITH_").split("__"));

    let config: AppConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.search.timeout_secs, 10);
        assert_eq!(config.search.related_topics_limit, 3);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.max_tokens, 2000);
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.llm.model, "gpt-4-1106-preview");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.download_prefix_chars, 20);
        assert!(!config.pipeline.require_structured_research);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm.temperature = 3.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));

        let mut config = AppConfig::default();
        config.search.related_topics_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_explicit_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"gpt-4o-mini\"\n\n[search]\nrelated_topics_limit = 5\n\n[server]\nport = 9000"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.search.related_topics_limit, 5);
        assert_eq!(config.server.port, 9000);
        // Untouched keys keep their defaults
        assert_eq!(config.llm.max_tokens, 2000);
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let err = load_config(Some(Path::new("/nonexistent/chartsmith.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_config_rejects_invalid_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\nmax_tokens = 0").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        let restored: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored.llm.base_url, config.llm.base_url);
        assert_eq!(restored.server.port, config.server.port);
    }
}
