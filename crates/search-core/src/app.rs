//! Wires the input controller to the search session on a single event loop.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::{Intent, InteractionState, SearchInputController};
use crate::events::{InputEvent, InputHub, Subscription};
use crate::highlight::ResultRow;
use crate::session::{SearchSessionCoordinator, SessionState};

/// Everything a renderer needs, detached from the live components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSnapshot {
    pub interaction: InteractionState,
    pub session: SessionState,
    pub rows: Vec<ResultRow>,
}

pub struct SearchApp {
    controller: SearchInputController,
    session: SearchSessionCoordinator,
    subscription: Subscription,
    shutdown: CancellationToken,
}

impl SearchApp {
    /// Subscribes to `hub` for as long as the app lives.
    pub fn mount(
        hub: &InputHub,
        controller: SearchInputController,
        session: SearchSessionCoordinator,
    ) -> Self {
        Self {
            controller,
            session,
            subscription: hub.subscribe(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn controller(&self) -> &SearchInputController {
        &self.controller
    }

    pub fn session(&self) -> &SearchSessionCoordinator {
        &self.session
    }

    /// Token that stops [`SearchApp::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Feeds one input event through the controller and forwards any resulting request.
    pub fn dispatch(&mut self, event: InputEvent) {
        match self.controller.handle(event) {
            Some(Intent::Submit(query)) => {
                self.session.submit(&query);
            }
            Some(Intent::SelectSuggestion(text)) => {
                self.session.select_suggestion(&text);
            }
            None => {}
        }
    }

    /// Dispatches every hub event already queued for this app without waiting.
    pub fn drain_input(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Manual retry after a failed search.
    pub fn retry(&mut self) -> bool {
        self.session.retry().is_some()
    }

    /// Processes hub events and request completions until the hub goes away
    /// or the shutdown token fires.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!(target: "prompt_search_core", "search app shutting down");
                    break;
                }
                event = self.subscription.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                Some(outcome) = self.controller.next_suggestions() => {
                    self.controller.apply_suggestions(outcome);
                }
                Some(outcome) = self.session.next_outcome() => {
                    self.session.apply(outcome);
                }
            }
        }
    }

    /// Waits for the outstanding suggestion lookup and search, if any, to land.
    pub async fn settle(&mut self) {
        loop {
            let awaiting = self.controller.awaiting_suggestions();
            let loading = self.session.is_loading();
            if !awaiting && !loading {
                break;
            }
            tokio::select! {
                Some(outcome) = self.controller.next_suggestions(), if awaiting => {
                    self.controller.apply_suggestions(outcome);
                }
                Some(outcome) = self.session.next_outcome(), if loading => {
                    self.session.apply(outcome);
                }
                else => break,
            }
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let session = self.session.state().clone();
        let rows = session.rows();
        AppSnapshot {
            interaction: self.controller.state().clone(),
            session,
            rows,
        }
    }
}
