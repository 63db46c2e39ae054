//! The submitted query and the results shown for it.

use std::sync::Arc;
use std::time::Duration;

use prompt_search_client::{ClientError, SearchBackend, SearchResultSet};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::highlight::ResultRow;
use crate::tracker::{RequestTracker, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchErrorKind {
    Network,
    Timeout,
    Status(u16),
    Decode,
}

/// Why the last search failed, with a message fit for the error view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct SearchError {
    pub kind: SearchErrorKind,
    pub message: String,
    pub detail: String,
}

impl SearchError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: SearchErrorKind::Timeout,
            message: "The search service took too long to respond.".to_string(),
            detail: format!("no response within {}ms", after.as_millis()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            SearchErrorKind::Network | SearchErrorKind::Timeout => true,
            SearchErrorKind::Status(code) => code >= 500 || code == 429,
            SearchErrorKind::Decode => false,
        }
    }
}

impl From<ClientError> for SearchError {
    fn from(error: ClientError) -> Self {
        let detail = error.to_string();
        let (kind, message) = match error {
            ClientError::Timeout => (
                SearchErrorKind::Timeout,
                "The search service took too long to respond.".to_string(),
            ),
            ClientError::Status(status) => (
                SearchErrorKind::Status(status.as_u16()),
                format!("The search service returned an error (HTTP {}).", status.as_u16()),
            ),
            ClientError::Decode(_) => (
                SearchErrorKind::Decode,
                "The search service sent a response that could not be read.".to_string(),
            ),
            ClientError::Http(_) | ClientError::InvalidBaseUrl { .. } => (
                SearchErrorKind::Network,
                "Could not reach the search service.".to_string(),
            ),
        };
        Self {
            kind,
            message,
            detail,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub active_query: Option<String>,
    pub results: Option<SearchResultSet>,
    pub status: SearchStatus,
    pub error: Option<SearchError>,
}

impl SessionState {
    /// Held results prepared for display.
    pub fn rows(&self) -> Vec<ResultRow> {
        self.results
            .as_ref()
            .map(|results| results.items.iter().map(ResultRow::from).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub page_size: usize,
    pub timeout: Duration,
    /// Keep the previous results visible after a failed search.
    pub keep_results_on_error: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            timeout: Duration::from_secs(10),
            keep_results_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOrigin {
    Typed,
    Suggestion,
    Retry,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub ticket: Ticket,
    pub query: String,
    pub result: Result<SearchResultSet, SearchError>,
}

/// Issues one search per submission and applies only the latest answer.
pub struct SearchSessionCoordinator {
    backend: Arc<dyn SearchBackend>,
    tracker: RequestTracker,
    options: SessionOptions,
    state: SessionState,
    outcomes_tx: mpsc::UnboundedSender<SearchOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<SearchOutcome>,
}

impl SearchSessionCoordinator {
    pub fn new(backend: Arc<dyn SearchBackend>, options: SessionOptions) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            tracker: RequestTracker::new(),
            options,
            state: SessionState::default(),
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.status == SearchStatus::Loading
    }

    pub fn submit(&mut self, query: &str) -> Option<Ticket> {
        self.issue(query, SubmissionOrigin::Typed)
    }

    pub fn select_suggestion(&mut self, text: &str) -> Option<Ticket> {
        self.issue(text, SubmissionOrigin::Suggestion)
    }

    /// Re-runs the active query after a failure. No-op in any other status.
    pub fn retry(&mut self) -> Option<Ticket> {
        if self.state.status != SearchStatus::Failed {
            return None;
        }
        let query = self.state.active_query.clone()?;
        self.issue(&query, SubmissionOrigin::Retry)
    }

    /// Applies an outcome if it answers the most recent submission.
    pub fn apply(&mut self, outcome: SearchOutcome) -> bool {
        if !self.tracker.is_current(outcome.ticket) {
            debug!(
                target: "prompt_search_core",
                query = %outcome.query,
                ticket = outcome.ticket.sequence(),
                "discarding superseded search response"
            );
            return false;
        }

        match outcome.result {
            Ok(results) => {
                info!(
                    target: "prompt_search_core",
                    query = %outcome.query,
                    total = results.total,
                    took_ms = results.took_millis,
                    hits = results.items.len(),
                    "search completed"
                );
                self.state.status = SearchStatus::Loaded;
                self.state.results = Some(results);
                self.state.error = None;
            }
            Err(error) => {
                warn!(
                    target: "prompt_search_core",
                    query = %outcome.query,
                    error = %error.detail,
                    "search failed"
                );
                self.state.status = SearchStatus::Failed;
                self.state.error = Some(error);
                if !self.options.keep_results_on_error {
                    self.state.results = None;
                }
            }
        }
        true
    }

    pub async fn next_outcome(&mut self) -> Option<SearchOutcome> {
        self.outcomes_rx.recv().await
    }

    /// Waits until the latest submission has been applied.
    pub async fn settle(&mut self) -> &SessionState {
        while self.is_loading() {
            let Some(outcome) = self.outcomes_rx.recv().await else {
                break;
            };
            self.apply(outcome);
        }
        &self.state
    }

    fn issue(&mut self, query: &str, origin: SubmissionOrigin) -> Option<Ticket> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            debug!(target: "prompt_search_core", ?origin, "blank submission ignored");
            return None;
        }

        let ticket = self.tracker.issue();
        let query = trimmed.to_string();
        self.state.active_query = Some(query.clone());
        self.state.status = SearchStatus::Loading;
        self.state.error = None;
        debug!(
            target: "prompt_search_core",
            query = %query,
            ?origin,
            ticket = ticket.sequence(),
            "search dispatched"
        );

        let backend = self.backend.clone();
        let sender = self.outcomes_tx.clone();
        let page_size = self.options.page_size;
        let timeout = self.options.timeout;
        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(timeout, backend.search(&query, page_size)).await {
                    Ok(Ok(results)) => Ok(results),
                    Ok(Err(error)) => Err(SearchError::from(error)),
                    Err(_) => Err(SearchError::timeout(timeout)),
                };
            let _ = sender.send(SearchOutcome {
                ticket,
                query,
                result,
            });
        });
        Some(ticket)
    }
}
