//! # Chartsmith Core
//!
//! Turns a natural-language data question into runnable chart code in two
//! model calls: a web search feeds a research prompt, and the research text
//! feeds a code-generation prompt. Provides the search client, the
//! chat-completion client, both agents, configuration, credentials, and the
//! per-session run state machine.

pub mod agents;
pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod research;
pub mod search;
pub mod session;
pub mod types;

// Re-export commonly used types at the crate root.
pub use agents::{ChartCodeAgent, ResearchAgent};
pub use config::{AppConfig, LlmConfig, PipelineConfig, SearchConfig, ServerConfig, load_config};
pub use credentials::{CredentialResolver, CredentialStore};
pub use download::{ChartDownload, content_disposition, download_file_name};
pub use error::{ChartsmithError, ErrorKind, LlmError, PipelineError, Result, SearchError};
pub use llm::{ChatProvider, MockChatProvider, OpenAiChatClient};
pub use pipeline::{Pipeline, SubmitOutcome};
pub use research::{ResearchOutline, ResearchSection};
pub use search::{SearchClient, SearchDigest};
pub use session::{ResearchSession, RunState, SessionStore};
pub use types::{ChatMessage, Role, Stage};
