//! The two prompt-and-call steps of the pipeline.
//!
//! Each agent builds its messages and makes exactly one provider call. The
//! provider's text comes back unmodified: no retries, no post-processing.

use std::sync::Arc;

use tracing::info;

use crate::error::LlmError;
use crate::llm::ChatProvider;
use crate::prompts;

/// Turns a query plus search text into research text.
#[derive(Clone)]
pub struct ResearchAgent {
    provider: Arc<dyn ChatProvider>,
}

impl ResearchAgent {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(&self, query: &str, search_text: &str) -> Result<String, LlmError> {
        info!(model = self.provider.model_name(), "Research agent working");
        let messages = prompts::research_messages(query, search_text);
        self.provider.complete(&messages).await
    }
}

/// Turns a query plus research text into chart-plotting source code.
#[derive(Clone)]
pub struct ChartCodeAgent {
    provider: Arc<dyn ChatProvider>,
}

impl ChartCodeAgent {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(&self, query: &str, research: &str) -> Result<String, LlmError> {
        info!(model = self.provider.model_name(), "Chart generator working");
        let messages = prompts::chart_code_messages(query, research);
        self.provider.complete(&messages).await
    }
}
