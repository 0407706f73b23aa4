//! Instant-answer web search.
//!
//! Queries a DuckDuckGo-style instant answer API and condenses the response
//! into a short text block for the research prompt. No API key is needed.
//!
//! `SearchClient::search` reports failures as `SearchError`;
//! `SearchClient::lookup` is total and always yields text the pipeline can
//! hand to the research agent.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::SearchError;

/// The useful parts of an instant-answer response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDigest {
    /// Top-level `AbstractText`, when non-empty.
    pub summary: Option<String>,
    /// `Text` of the leading related topics.
    pub related: Vec<String>,
}

impl SearchDigest {
    /// Extract a digest from a parsed response body.
    ///
    /// Only the first `related_limit` entries of `RelatedTopics` are looked
    /// at; grouped entries without a `Text` field use up a slot.
    pub fn from_response(body: &Value, related_limit: usize) -> Self {
        let summary = body
            .get("AbstractText")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let related = body
            .get("RelatedTopics")
            .and_then(|v| v.as_array())
            .map(|topics| {
                topics
                    .iter()
                    .take(related_limit)
                    .filter_map(|topic| topic.get("Text").and_then(|t| t.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self { summary, related }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.related.is_empty()
    }

    /// Render the digest as prompt text, or a placeholder when it is empty.
    pub fn render(&self, query: &str) -> String {
        let mut parts = Vec::with_capacity(self.related.len() + 1);
        if let Some(summary) = &self.summary {
            parts.push(format!("Summary: {summary}"));
        }
        for text in &self.related {
            parts.push(format!("Related: {text}"));
        }
        if parts.is_empty() {
            format!("Basic search completed for: {query}")
        } else {
            parts.join("\n\n")
        }
    }
}

/// Text handed to the research agent when the search itself failed.
pub fn fallback_text(query: &str, error: &SearchError) -> String {
    match error {
        SearchError::Status { .. } => format!(
            "Search completed for: {query}. Please provide more specific terms for better results."
        ),
        _ => format!(
            "Web search for '{query}' completed. Manual research may be needed for specific data."
        ),
    }
}

/// HTTP client for the instant-answer endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
    related_topics_limit: usize,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Client {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            related_topics_limit: config.related_topics_limit,
        })
    }

    /// Build the request URL for `query`.
    pub fn request_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&format=json&no_redirect=1",
            self.endpoint,
            urlencoding::encode(query)
        )
    }

    /// Run one search and extract its digest.
    pub async fn search(&self, query: &str) -> Result<SearchDigest, SearchError> {
        let url = self.request_url(query);
        debug!(url = %url, "Sending instant-answer search request");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                SearchError::Transport {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        // The endpoint does not always label its JSON as such, so parse the
        // body text rather than relying on the content type.
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                SearchError::Transport {
                    message: e.to_string(),
                }
            }
        })?;
        let body: Value = serde_json::from_str(&text).map_err(|e| SearchError::Parse {
            message: e.to_string(),
        })?;

        Ok(SearchDigest::from_response(&body, self.related_topics_limit))
    }

    /// Search and always return prompt text, degrading to a fallback line.
    pub async fn lookup(&self, query: &str) -> String {
        match self.search(query).await {
            Ok(digest) => digest.render(query),
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Search degraded to fallback text");
                fallback_text(query, &e)
            }
        }
    }
}
