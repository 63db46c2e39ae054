//! Debounced, cancellable autocomplete lookups.
//!
//! Every call captures a [`Ticket`]. The request waits out the quiet window,
//! then only reaches the network if its ticket is still the latest; the
//! answer is handed back only if the ticket is still the latest when it lands.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use prompt_search_client::{SearchBackend, SuggestionItem};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::tracker::{RequestTracker, Ticket};

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub min_query_len: usize,
    pub page_size: usize,
    pub debounce: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            page_size: 8,
            debounce: Duration::from_millis(300),
        }
    }
}

/// Suggestions that survived the staleness guard for the query they were fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub ticket: Ticket,
    pub query: String,
    pub suggestions: Vec<SuggestionItem>,
}

pub struct SuggestionFetcher {
    backend: Arc<dyn SearchBackend>,
    tracker: RequestTracker,
    options: FetcherOptions,
    failures: Arc<AtomicUsize>,
    pending: Option<Ticket>,
    outcomes_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl SuggestionFetcher {
    pub fn new(backend: Arc<dyn SearchBackend>, options: FetcherOptions) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            tracker: RequestTracker::new(),
            options,
            failures: Arc::new(AtomicUsize::new(0)),
            pending: None,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn options(&self) -> &FetcherOptions {
        &self.options
    }

    pub fn meets_threshold(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.options.min_query_len
    }

    /// Lazily looks up suggestions for `partial`.
    ///
    /// Resolves to `None` when a later call superseded this one, either during
    /// the quiet window or while the request was in flight. Sub-threshold input
    /// resolves to an empty list without touching the network.
    pub fn fetch(&self, partial: &str) -> BoxFuture<'static, Option<Vec<SuggestionItem>>> {
        let ticket = self.tracker.issue();
        self.lookup(ticket, partial)
    }

    /// Starts a lookup in the background; a surviving result arrives through
    /// [`SuggestionFetcher::next_outcome`]. Sub-threshold input only retires
    /// older lookups and reports nothing.
    pub fn dispatch(&mut self, partial: &str) -> Ticket {
        let ticket = self.tracker.issue();
        let query = partial.trim().to_string();
        if !self.meets_threshold(&query) {
            // Nothing to report; the fresh ticket alone retires older lookups.
            self.pending = None;
            return ticket;
        }

        let lookup = self.lookup(ticket, partial);
        let sender = self.outcomes_tx.clone();
        self.pending = Some(ticket);

        tokio::spawn(async move {
            if let Some(suggestions) = lookup.await {
                let _ = sender.send(FetchOutcome {
                    ticket,
                    query,
                    suggestions,
                });
            }
        });
        ticket
    }

    /// Retires whatever lookup is outstanding.
    pub fn cancel(&mut self) {
        self.tracker.invalidate();
        self.pending = None;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.tracker.is_current(ticket)
    }

    /// Whether a dispatched lookup is still expected to report back.
    pub fn is_pending(&self) -> bool {
        self.pending
            .is_some_and(|ticket| self.tracker.is_current(ticket))
    }

    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        let outcome = self.outcomes_rx.recv().await;
        self.settle_pending(outcome.as_ref());
        outcome
    }

    pub fn try_next_outcome(&mut self) -> Option<FetchOutcome> {
        let outcome = self.outcomes_rx.try_recv().ok();
        self.settle_pending(outcome.as_ref());
        outcome
    }

    /// Number of lookups that failed and were downgraded to an empty list.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn settle_pending(&mut self, outcome: Option<&FetchOutcome>) {
        if let Some(outcome) = outcome {
            if self.pending == Some(outcome.ticket) {
                self.pending = None;
            }
        }
    }

    fn lookup(
        &self,
        ticket: Ticket,
        partial: &str,
    ) -> BoxFuture<'static, Option<Vec<SuggestionItem>>> {
        let query = partial.trim().to_string();
        if !self.meets_threshold(&query) {
            debug!(
                target: "prompt_search_core",
                query = %query,
                "input below suggestion threshold; no lookup"
            );
            return future::ready(Some(Vec::new())).boxed();
        }

        let backend = self.backend.clone();
        let tracker = self.tracker.clone();
        let failures = self.failures.clone();
        let options = self.options.clone();

        async move {
            if !options.debounce.is_zero() {
                tokio::time::sleep(options.debounce).await;
            }
            if !tracker.is_current(ticket) {
                debug!(target: "prompt_search_core", query = %query, "lookup superseded within quiet window");
                return None;
            }

            let suggestions = match backend.suggest(&query, options.page_size).await {
                Ok(items) => items,
                Err(error) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "prompt_search_core",
                        query = %query,
                        error = %error,
                        "suggestion lookup failed; showing no suggestions"
                    );
                    Vec::new()
                }
            };

            if !tracker.is_current(ticket) {
                debug!(target: "prompt_search_core", query = %query, "discarding stale suggestions");
                return None;
            }
            Some(suggestions)
        }
        .boxed()
    }
}
