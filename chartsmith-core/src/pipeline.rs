//! The linear search -> research -> chart code run.
//!
//! `Pipeline::submit` drives one `ResearchSession` through the run state
//! machine. Upstream failures never escape as errors: a degraded search turns
//! into fallback text and a failed chat call moves the session to `Failed`
//! with the error's kind and display text. The only `Err` this module
//! returns is a state-machine violation, which indicates a bug.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::{ChartCodeAgent, ResearchAgent};
use crate::config::{AppConfig, PipelineConfig};
use crate::credentials::CredentialResolver;
use crate::error::{ChartsmithError, ErrorKind, PipelineError};
use crate::llm::{ChatProvider, OpenAiChatClient};
use crate::search::SearchClient;
use crate::session::{ResearchSession, RunState};
use crate::types::Stage;

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The query was blank; the session was not touched.
    EmptyQuery,
    /// The run went as far as it could; inspect the session's state.
    Finished(RunState),
}

/// Wires the search client and both agents together.
#[derive(Clone)]
pub struct Pipeline {
    search: SearchClient,
    research: ResearchAgent,
    chart_code: ChartCodeAgent,
    settings: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        search: SearchClient,
        provider: Arc<dyn ChatProvider>,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            search,
            research: ResearchAgent::new(provider.clone()),
            chart_code: ChartCodeAgent::new(provider),
            settings,
        }
    }

    /// Build the production pipeline: instant-answer search plus an
    /// OpenAI-compatible chat client.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChartsmithError> {
        let search = SearchClient::new(&config.search)?;
        let provider =
            OpenAiChatClient::new(&config.llm, CredentialResolver::from_config(&config.llm))?;
        Ok(Self::new(
            search,
            Arc::new(provider),
            config.pipeline.clone(),
        ))
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    /// Run one submission against `session`.
    pub async fn submit(
        &self,
        session: &mut ResearchSession,
        raw_query: &str,
    ) -> Result<SubmitOutcome, PipelineError> {
        let query = raw_query.trim();
        if query.is_empty() {
            warn!("Rejected empty query");
            return Ok(SubmitOutcome::EmptyQuery);
        }

        session.begin(query);
        info!(session = %session.id, query = %query, "Run started");

        let search_text = self.search.lookup(query).await;
        session.record_search(search_text.clone());

        let research = match self.research.run(query, &search_text).await {
            Ok(text) if text.trim().is_empty() => {
                warn!(session = %session.id, "Research stage returned empty text");
                session.fail(
                    Stage::Research,
                    ErrorKind::Validation,
                    PipelineError::EmptyResearch.to_string(),
                )?;
                return Ok(SubmitOutcome::Finished(session.state.clone()));
            }
            Ok(text) => text,
            Err(e) => {
                warn!(session = %session.id, error = %e, kind = %e.kind(), "Research stage failed");
                session.fail(Stage::Research, e.kind(), e.to_string())?;
                return Ok(SubmitOutcome::Finished(session.state.clone()));
            }
        };
        session.complete_research(research)?;
        info!(session = %session.id, "Research done");

        if let Some(outline) = &session.outline
            && !outline.is_complete()
        {
            let missing = outline.missing_labels();
            if self.settings.require_structured_research {
                let err = PipelineError::MalformedResearch { missing };
                warn!(session = %session.id, error = %err, "Research rejected before code generation");
                session.fail(Stage::Research, err.kind(), err.to_string())?;
                return Ok(SubmitOutcome::Finished(session.state.clone()));
            }
            warn!(session = %session.id, missing = %missing, "Research text lacks requested sections");
        }

        session.start_generating()?;
        let research = session.research.clone().unwrap_or_default();
        match self.chart_code.run(query, &research).await {
            Ok(code) => {
                session.complete_code(code)?;
                info!(session = %session.id, "Chart code generated");
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, kind = %e.kind(), "Code generation failed");
                session.fail(Stage::CodeGeneration, e.kind(), e.to_string())?;
            }
        }

        Ok(SubmitOutcome::Finished(session.state.clone()))
    }
}
