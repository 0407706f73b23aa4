//! Per-browser session state and the run state machine.
//!
//! A `ResearchSession` holds the last query, research text, and chart code
//! for one visitor. Values live until the next submission resets them or the
//! session is dropped from the `SessionStore`. Nothing is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::download::ChartDownload;
use crate::error::{ErrorKind, PipelineError};
use crate::research::ResearchOutline;
use crate::types::Stage;

/// Where a session's current run stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Researching,
    ResearchDone,
    Generating,
    GeneratingDone,
    Failed {
        stage: Stage,
        kind: ErrorKind,
        detail: String,
    },
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Researching => "researching",
            RunState::ResearchDone => "research_done",
            RunState::Generating => "generating",
            RunState::GeneratingDone => "generating_done",
            RunState::Failed { .. } => "failed",
        }
    }

    /// Whether `self -> to` is a legal step within a run.
    ///
    /// Starting a new run (`-> Researching`) is legal from every state.
    pub fn can_transition(&self, to: &RunState) -> bool {
        matches!(
            (self, to),
            (_, RunState::Researching)
                | (RunState::Researching, RunState::ResearchDone)
                | (RunState::ResearchDone, RunState::Generating)
                | (RunState::Generating, RunState::GeneratingDone)
                | (
                    RunState::Researching | RunState::ResearchDone | RunState::Generating,
                    RunState::Failed { .. }
                )
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunState::Failed { .. })
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// State kept for one visitor.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchSession {
    pub id: Uuid,
    pub query: Option<String>,
    pub search_text: Option<String>,
    pub research: Option<String>,
    pub outline: Option<ResearchOutline>,
    pub code: Option<String>,
    pub state: RunState,
    /// Example query picked from the sidebar, used to prefill the input.
    pub selected_query: Option<String>,
    pub selected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchSession {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            query: None,
            search_text: None,
            research: None,
            outline: None,
            code: None,
            state: RunState::Idle,
            selected_query: None,
            selected_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition(&to) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.name().to_string(),
                to: to.name().to_string(),
            });
        }
        self.state = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Start a new run: forget previous outputs and record the query.
    pub fn begin(&mut self, query: &str) {
        self.query = Some(query.to_string());
        self.selected_query = None;
        self.selected_at = None;
        self.search_text = None;
        self.research = None;
        self.outline = None;
        self.code = None;
        self.state = RunState::Researching;
        self.updated_at = Utc::now();
    }

    pub fn record_search(&mut self, text: String) {
        self.search_text = Some(text);
        self.updated_at = Utc::now();
    }

    /// Store research text. Empty text is rejected and leaves `research` unset.
    pub fn complete_research(&mut self, research: String) -> Result<(), PipelineError> {
        if research.trim().is_empty() {
            return Err(PipelineError::EmptyResearch);
        }
        self.transition(RunState::ResearchDone)?;
        self.outline = Some(ResearchOutline::inspect(&research));
        self.research = Some(research);
        Ok(())
    }

    /// Move to code generation; requires non-empty research for this query.
    pub fn start_generating(&mut self) -> Result<(), PipelineError> {
        if self.research.as_deref().is_none_or(|r| r.trim().is_empty()) {
            return Err(PipelineError::EmptyResearch);
        }
        self.transition(RunState::Generating)
    }

    pub fn complete_code(&mut self, code: String) -> Result<(), PipelineError> {
        self.transition(RunState::GeneratingDone)?;
        self.code = Some(code);
        Ok(())
    }

    /// Mark the run failed. Outputs already stored are kept.
    pub fn fail(
        &mut self,
        stage: Stage,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.transition(RunState::Failed {
            stage,
            kind,
            detail: detail.into(),
        })
    }

    /// Mark the session as seen, keeping it clear of stale eviction.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn select_example(&mut self, query: &str) {
        let now = Utc::now();
        self.selected_query = Some(query.to_string());
        self.selected_at = Some(now);
        self.updated_at = now;
    }

    /// Both outputs of a finished run are present.
    pub fn has_results(&self) -> bool {
        self.research.is_some() && self.code.is_some()
    }

    /// The download for the current code, if any.
    pub fn download(&self, prefix_chars: usize) -> Option<ChartDownload> {
        let code = self.code.as_deref()?;
        let query = self.query.as_deref().unwrap_or_default();
        Some(ChartDownload::new(query, code, prefix_chars))
    }
}

/// In-memory map of session id to session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<Uuid, ResearchSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its id.
    pub fn create(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, ResearchSession::new(id));
        id
    }

    /// Return `id` when it names a live session, otherwise create one.
    pub fn get_or_create(&mut self, id: Option<Uuid>) -> (Uuid, bool) {
        match id {
            Some(id) if self.sessions.contains_key(&id) => (id, false),
            _ => (self.create(), true),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&ResearchSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut ResearchSession> {
        self.sessions.get_mut(id)
    }

    /// Replace a session wholesale, e.g. after a run finished on a copy.
    pub fn put(&mut self, session: ResearchSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Store the outcome of a run that happened on a copy of a session.
    ///
    /// Only the run fields are taken from `run`; an example picked after
    /// `started_at` (while the run was in flight) survives.
    pub fn merge_run(&mut self, run: ResearchSession, started_at: DateTime<Utc>) {
        let Some(live) = self.sessions.get_mut(&run.id) else {
            self.put(run);
            return;
        };
        let pick = match live.selected_at {
            Some(at) if at >= started_at => live.selected_query.take().map(|q| (q, at)),
            _ => None,
        };
        let created_at = live.created_at;
        *live = run;
        live.created_at = created_at;
        if let Some((query, at)) = pick {
            live.selected_query = Some(query);
            live.selected_at = Some(at);
        }
    }

    /// Drop sessions untouched for longer than `ttl`. Returns how many went.
    pub fn remove_stale(&mut self, ttl: chrono::Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.updated_at >= cutoff);
        before - self.sessions.len()
    }
}
