use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use prompt_search_client::{
    ClientError, SearchBackend, SearchResultItem, SearchResultSet, SuggestionItem,
};

/// Scriptable backend: records every call, answers after an optional per-query delay.
#[derive(Default)]
pub(crate) struct FakeBackend {
    suggest_calls: Mutex<Vec<String>>,
    search_calls: Mutex<Vec<String>>,
    suggest_delays: HashMap<String, Duration>,
    search_delays: HashMap<String, Duration>,
    fail_suggestions: bool,
    search_failure: Option<ClientError>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_suggest_delay(mut self, query: &str, delay: Duration) -> Self {
        self.suggest_delays.insert(query.to_string(), delay);
        self
    }

    pub(crate) fn with_search_delay(mut self, query: &str, delay: Duration) -> Self {
        self.search_delays.insert(query.to_string(), delay);
        self
    }

    pub(crate) fn failing_suggestions(mut self) -> Self {
        self.fail_suggestions = true;
        self
    }

    pub(crate) fn failing_search(mut self, error: ClientError) -> Self {
        self.search_failure = Some(error);
        self
    }

    pub(crate) fn suggest_calls(&self) -> Vec<String> {
        self.suggest_calls.lock().unwrap().clone()
    }

    pub(crate) fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }
}

pub(crate) fn result_set_for(query: &str) -> SearchResultSet {
    SearchResultSet {
        items: vec![
            SearchResultItem {
                prompt: format!("{query} prompt"),
                query: query.to_string(),
                score: 2.0,
                match_percentage: 100,
                highlight: None,
            },
            SearchResultItem {
                prompt: format!("another {query}"),
                query: query.to_string(),
                score: 1.0,
                match_percentage: 50,
                highlight: None,
            },
        ],
        total: 1532,
        took_millis: 42,
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn suggest(&self, query: &str, size: usize) -> Result<Vec<SuggestionItem>, ClientError> {
        self.suggest_calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.suggest_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_suggestions {
            return Err(ClientError::Http("connection reset".to_string()));
        }
        Ok((1..=size.min(3))
            .map(|n| SuggestionItem::new(format!("{query} {n}")))
            .collect())
    }

    async fn search(&self, query: &str, _size: usize) -> Result<SearchResultSet, ClientError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.search_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        match &self.search_failure {
            Some(error) => Err(error.clone()),
            None => Ok(result_set_for(query)),
        }
    }
}
