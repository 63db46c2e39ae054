use std::sync::Arc;

use anyhow::{Context, Result};
use prompt_search_client::{SearchBackend, SearchClient};
use tracing::info;

pub mod app;
pub mod controller;
pub mod events;
pub mod fetcher;
pub mod highlight;
pub mod session;
pub mod settings;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{AppSnapshot, SearchApp};
pub use controller::{Intent, InteractionState, SearchInputController};
pub use events::{InputEvent, InputHub, Subscription};
pub use fetcher::{FetchOutcome, FetcherOptions, SuggestionFetcher};
pub use highlight::{format_highlight, ResultRow, Span};
pub use session::{
    SearchError, SearchErrorKind, SearchOutcome, SearchSessionCoordinator, SearchStatus,
    SessionOptions, SessionState,
};
pub use settings::SearchSettings;
pub use tracker::{RequestTracker, Ticket};

/// Shared client plus the settings every component is built from.
#[derive(Clone)]
pub struct CoreRuntime {
    settings: SearchSettings,
    client: Arc<SearchClient>,
}

impl CoreRuntime {
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn client(&self) -> Arc<SearchClient> {
        self.client.clone()
    }

    fn backend(&self) -> Arc<dyn SearchBackend> {
        self.client.clone()
    }

    pub fn fetcher(&self) -> SuggestionFetcher {
        SuggestionFetcher::new(self.backend(), self.settings.fetcher_options())
    }

    pub fn controller(&self) -> SearchInputController {
        SearchInputController::new(self.fetcher())
    }

    pub fn coordinator(&self) -> SearchSessionCoordinator {
        SearchSessionCoordinator::new(self.backend(), self.settings.session_options())
    }

    pub fn mount(&self, hub: &InputHub) -> SearchApp {
        SearchApp::mount(hub, self.controller(), self.coordinator())
    }
}

pub fn bootstrap(settings: SearchSettings) -> Result<CoreRuntime> {
    settings.validate()?;
    let client = SearchClient::new(settings.client_config())
        .with_context(|| format!("cannot use search service at `{}`", settings.base_url))?;

    info!(
        target: "prompt_search_core",
        base_url = %client.base_url(),
        debounce_ms = settings.debounce_ms,
        request_timeout_ms = settings.request_timeout_ms,
        "search runtime ready"
    );

    Ok(CoreRuntime {
        settings,
        client: Arc::new(client),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_rejects_bad_base_url() {
        let settings = SearchSettings::default().with_base_url("not a url");
        assert!(bootstrap(settings).is_err());
    }

    #[tokio::test]
    async fn mounted_app_holds_one_subscription() {
        let runtime = bootstrap(SearchSettings::default()).expect("bootstrap succeeds");
        let hub = InputHub::new();

        let app = runtime.mount(&hub);
        assert_eq!(hub.subscriber_count(), 1);

        drop(app);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
