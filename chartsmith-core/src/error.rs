//! Error types for the Chartsmith core library.
//!
//! Uses `thiserror` for public API error types. Every variant's `Display`
//! text is written for the person reading the page, since failed stages are
//! rendered as-is next to the partial results.

use std::path::PathBuf;

/// Top-level error type for the Chartsmith core library.
#[derive(Debug, thiserror::Error)]
pub enum ChartsmithError {
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a failure, used by the orchestration layer and
/// the page to branch without inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingKey,
    Transport,
    Timeout,
    HttpStatus,
    Parse,
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::MissingKey => "missing key",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::HttpStatus => "http status",
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
        };
        f.write_str(label)
    }
}

/// Errors from the web search client.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Failed to create HTTP client: {message}")]
    Client { message: String },

    #[error("Search request failed: {message}")]
    Transport { message: String },

    #[error("Search request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Search endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Failed to parse search response: {message}")]
    Parse { message: String },
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Client { .. } | SearchError::Transport { .. } => ErrorKind::Transport,
            SearchError::Timeout { .. } => ErrorKind::Timeout,
            SearchError::Status { .. } => ErrorKind::HttpStatus,
            SearchError::Parse { .. } => ErrorKind::Parse,
        }
    }
}

/// Errors from chat-completion requests.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("OpenAI API key not found. Set {env_var} or add it to the secrets store.")]
    MissingKey { env_var: String },

    #[error("Failed to create HTTP client: {message}")]
    Client { message: String },

    #[error("Error calling chat completion API: {message}")]
    Transport { message: String },

    #[error("Chat completion request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("API Error: {status}. Please check your API key and try again.")]
    Status { status: u16, body: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::MissingKey { .. } => ErrorKind::MissingKey,
            LlmError::Client { .. } | LlmError::Transport { .. } => ErrorKind::Transport,
            LlmError::Timeout { .. } => ErrorKind::Timeout,
            LlmError::Status { .. } => ErrorKind::HttpStatus,
            LlmError::ResponseParse { .. } => ErrorKind::Parse,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from credential storage backends.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential not found for {service}:{account}")]
    NotFound { service: String, account: String },

    #[error("Failed to read secrets file {path}: {message}")]
    SecretsFile { path: PathBuf, message: String },

    #[error("Keyring backend not available: {message}")]
    BackendUnavailable { message: String },
}

/// Errors from the research pipeline itself (not from the upstream APIs).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Research output is missing required sections: {missing}")]
    MalformedResearch { missing: String },

    #[error("Research output was empty")]
    EmptyResearch,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// A type alias for results using the top-level `ChartsmithError`.
pub type Result<T> = std::result::Result<T, ChartsmithError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_mentions_key_not_found() {
        let err = LlmError::MissingKey {
            env_var: "OPENAI_API_KEY".into(),
        };
        let text = err.to_string();
        assert!(text.contains("API key not found"));
        assert!(text.contains("OPENAI_API_KEY"));
        assert_eq!(err.kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn test_status_error_embeds_code() {
        let err = LlmError::Status {
            status: 429,
            body: "{}".into(),
        };
        assert_eq!(
            err.to_string(),
            "API Error: 429. Please check your API key and try again."
        );
        assert_eq!(err.kind(), ErrorKind::HttpStatus);
    }

    #[test]
    fn test_search_error_kinds() {
        assert_eq!(
            SearchError::Status { status: 503 }.kind(),
            ErrorKind::HttpStatus
        );
        assert_eq!(
            SearchError::Timeout { timeout_secs: 10 }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            SearchError::Parse {
                message: "eof".into()
            }
            .kind(),
            ErrorKind::Parse
        );
    }

    #[test]
    fn test_error_display_wrapping() {
        let err = ChartsmithError::Pipeline(PipelineError::EmptyResearch);
        assert_eq!(err.to_string(), "Pipeline error: Research output was empty");

        let err: ChartsmithError = ConfigError::Invalid {
            message: "port must be non-zero".into(),
        }
        .into();
        assert!(matches!(err, ChartsmithError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChartsmithError = io_err.into();
        assert!(matches!(err, ChartsmithError::Io(_)));
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MissingKey).unwrap();
        assert_eq!(json, "\"missing_key\"");
        assert_eq!(ErrorKind::HttpStatus.to_string(), "http status");
    }
}
