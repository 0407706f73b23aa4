//! HTTP server built on axum.
//!
//! Serves one page per visitor session. The session id travels in the
//! `chartsmith_session` cookie; the state itself stays in memory.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chartsmith_core::config::AppConfig;
use chartsmith_core::credentials::CredentialResolver;
use chartsmith_core::download::{ChartDownload, content_disposition};
use chartsmith_core::error::ChartsmithError;
use chartsmith_core::pipeline::{Pipeline, SubmitOutcome};
use chartsmith_core::session::{ResearchSession, SessionStore};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::page::{KeyStatus, Notice, PageView, render_page};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "chartsmith_session";

/// Shared application state handed to every handler.
pub type SharedApp = Arc<AppState>;

pub struct AppState {
    sessions: Mutex<SessionStore>,
    pipeline: Pipeline,
    credentials: CredentialResolver,
    config: AppConfig,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline, credentials: CredentialResolver) -> Self {
        Self {
            sessions: Mutex::new(SessionStore::new()),
            pipeline,
            credentials,
            config,
            started_at: Instant::now(),
        }
    }

    /// Production wiring: real search and chat clients from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, ChartsmithError> {
        let pipeline = Pipeline::from_config(&config)?;
        let credentials = CredentialResolver::from_config(&config.llm);
        Ok(Self::new(config, pipeline, credentials))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a chat API key currently resolves.
    pub fn has_key(&self) -> bool {
        self.credentials.has_key()
    }

    fn key_status(&self) -> KeyStatus {
        if self.has_key() {
            KeyStatus::Ready
        } else {
            KeyStatus::Missing {
                env_var: self.credentials.env_var().to_string(),
            }
        }
    }

    /// Find or create the caller's session, evicting stale ones on the way.
    /// Returns a snapshot; write changes back with `SessionStore::put`.
    async fn session_for(&self, headers: &HeaderMap) -> ResearchSession {
        let mut store = self.sessions.lock().await;
        let ttl = chrono_secs(self.config.server.session_ttl_secs);
        let removed = store.remove_stale(ttl);
        if removed > 0 {
            debug!(removed, "Evicted stale sessions");
        }

        let (id, created) = store.get_or_create(session_cookie(headers));
        if created {
            info!(session = %id, "Session created");
        }
        match store.get_mut(&id) {
            Some(session) => {
                session.touch();
                session.clone()
            }
            None => ResearchSession::new(id),
        }
    }

    async fn save(&self, session: ResearchSession) {
        self.sessions.lock().await.put(session);
    }

    /// Write a finished run back and return the merged session to render.
    async fn finish_run(
        &self,
        run: ResearchSession,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> ResearchSession {
        let mut store = self.sessions.lock().await;
        let id = run.id;
        store.merge_run(run.clone(), started_at);
        store.get(&id).cloned().unwrap_or(run)
    }
}

// Ten years; keeps `now - ttl` inside chrono's range.
const MAX_TTL_SECS: u64 = 315_360_000;

fn chrono_secs(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

/// Build the router with every page route and request tracing.
pub fn router(app: SharedApp) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/generate", post(generate_handler))
        .route("/select", post(select_handler))
        .route("/download", get(download_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[derive(Debug, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
}

async fn index_handler(State(app): State<SharedApp>, headers: HeaderMap) -> Response {
    let session = app.session_for(&headers).await;
    let html = render_page(&PageView {
        session: &session,
        key: app.key_status(),
        notice: None,
        fresh_run: false,
    });
    with_cookie(session.id, Html(html))
}

async fn generate_handler(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Form(form): Form<QueryForm>,
) -> Response {
    let mut session = app.session_for(&headers).await;

    let key = app.key_status();
    if key != KeyStatus::Ready {
        info!(session = %session.id, "Submission refused: no API key configured");
        let html = render_page(&PageView {
            session: &session,
            key,
            notice: None,
            fresh_run: false,
        });
        return with_cookie(session.id, Html(html));
    }

    // The run happens on a snapshot so the store lock is never held across
    // upstream calls; `merge_run` keeps any example picked meanwhile.
    let run_started = chrono::Utc::now();
    let (notice, fresh_run) = match app.pipeline.submit(&mut session, &form.query).await {
        Ok(SubmitOutcome::EmptyQuery) => (
            Some(Notice::Warning("Please enter a query!".into())),
            false,
        ),
        Ok(SubmitOutcome::Finished(state)) => {
            info!(session = %session.id, state = %state, "Run finished");
            (None, true)
        }
        Err(e) => {
            error!(session = %session.id, error = %e, "Run aborted");
            (Some(Notice::Error(e.to_string())), true)
        }
    };
    let session = app.finish_run(session, run_started).await;

    let html = render_page(&PageView {
        session: &session,
        key: KeyStatus::Ready,
        notice,
        fresh_run,
    });
    with_cookie(session.id, Html(html))
}

async fn select_handler(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Form(form): Form<QueryForm>,
) -> Response {
    let mut session = app.session_for(&headers).await;
    session.select_example(form.query.trim());
    let id = session.id;
    app.save(session).await;
    with_cookie(id, Redirect::to("/"))
}

async fn download_handler(State(app): State<SharedApp>, headers: HeaderMap) -> Response {
    let session = app.session_for(&headers).await;
    match session.download(app.config.pipeline.download_prefix_chars) {
        Some(download) => {
            debug!(session = %session.id, file = %download.file_name, "Serving chart download");
            with_cookie(session.id, download_response(download))
        }
        None => with_cookie(
            session.id,
            (StatusCode::NOT_FOUND, "No chart code has been generated yet."),
        ),
    }
}

fn download_response(download: ChartDownload) -> Response {
    let disposition = content_disposition(&download.file_name);
    (
        [
            (header::CONTENT_TYPE, ChartDownload::CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.content,
    )
        .into_response()
}

/// Health check endpoint.
async fn health_handler(State(app): State<SharedApp>) -> impl IntoResponse {
    let sessions = app.sessions.lock().await.len();
    Json(serde_json::json!({
        "status": "ok",
        "key_configured": app.has_key(),
        "model": app.config.llm.model,
        "sessions": sessions,
        "uptime_secs": app.started_at.elapsed().as_secs(),
    }))
}

/// Session id from the request cookies, if present and well-formed.
pub fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn with_cookie(id: Uuid, response: impl IntoResponse) -> Response {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    ([(header::SET_COOKIE, cookie)], response).into_response()
}

/// Bind the configured address and serve until cancelled.
pub async fn run(app: SharedApp) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", app.config.server.host, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Chartsmith listening");
    axum::serve(listener, router(app)).await
}
