pub mod cache;
pub mod types;

pub use cache::CacheStatsSnapshot;
pub use reqwest::StatusCode;
pub use types::{
    Highlight, HealthReport, SearchResultItem, SearchResultSet, SuggestionItem,
};

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use cache::MemoryCache;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::Duration;
use tracing::{debug, instrument, warn};

use crate::types::{AutocompleteResponse, SearchResponse};

const AUTOCOMPLETE_PATH: &str = "autocomplete";
const SEARCH_PATH: &str = "search_by_prompt_or_query";
const HEALTH_PATH: &str = "health";

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status code: {0}")]
    Status(StatusCode),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ClientError {
    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: StdDuration,
    pub user_agent: String,
    pub suggestion_cache_ttl: Duration,
    pub suggestion_cache_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: StdDuration::from_secs(10),
            user_agent: concat!("PromptSearch/", env!("CARGO_PKG_VERSION")).to_string(),
            suggestion_cache_ttl: Duration::minutes(5),
            suggestion_cache_capacity: 64,
        }
    }
}

/// The two read-only lookups the interaction layer needs from the search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn suggest(&self, query: &str, size: usize) -> Result<Vec<SuggestionItem>, ClientError>;

    async fn search(&self, query: &str, size: usize) -> Result<SearchResultSet, ClientError>;
}

#[derive(Debug)]
pub struct SearchClient {
    http: Client,
    base_url: Url,
    suggestion_cache: MemoryCache<Vec<SuggestionItem>>,
}

impl SearchClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(|err| ClientError::Http(err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            suggestion_cache: MemoryCache::new(
                config.suggestion_cache_ttl,
                config.suggestion_cache_capacity,
            ),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[instrument(name = "search_client.suggest", skip(self))]
    pub async fn suggest(
        &self,
        query: &str,
        size: usize,
    ) -> Result<Vec<SuggestionItem>, ClientError> {
        let normalized = query.trim().to_lowercase();
        let cache_key = format!("{size}:{normalized}");
        if let Some(cached) = self.suggestion_cache.get(&cache_key) {
            debug!(target: "prompt_search_client", query, "suggestions served from memory cache");
            return Ok(cached);
        }

        let response: AutocompleteResponse = self
            .fetch_json(AUTOCOMPLETE_PATH, query.trim(), size)
            .await?;
        let items = normalize_suggestions(response.suggestions, size);
        self.suggestion_cache.insert(cache_key, items.clone());
        Ok(items)
    }

    #[instrument(name = "search_client.search", skip(self))]
    pub async fn search(&self, query: &str, size: usize) -> Result<SearchResultSet, ClientError> {
        let response: SearchResponse = self.fetch_json(SEARCH_PATH, query, size).await?;
        Ok(SearchResultSet::from(response))
    }

    #[instrument(name = "search_client.health", skip(self))]
    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let url = self.endpoint(HEALTH_PATH);
        self.get_json(url).await
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.suggestion_cache.stats().snapshot()
    }

    pub fn clear_cache(&self) {
        self.suggestion_cache.clear();
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn fetch_json<T>(&self, path: &str, query: &str, size: usize) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = format!(
            "{}?q={}&size={size}",
            self.endpoint(path),
            urlencoding::encode(query)
        );
        self.get_json(url).await
    }

    async fn get_json<T>(&self, url: String) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        debug!(target: "prompt_search_client", url = %url, "sending request");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&err))?;

        if !response.status().is_success() {
            warn!(target: "prompt_search_client", status = %response.status(), url, "search service request failed");
            return Err(ClientError::Status(response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ClientError::from_reqwest(&err))?;
        serde_json::from_slice::<T>(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn suggest(&self, query: &str, size: usize) -> Result<Vec<SuggestionItem>, ClientError> {
        SearchClient::suggest(self, query, size).await
    }

    async fn search(&self, query: &str, size: usize) -> Result<SearchResultSet, ClientError> {
        SearchClient::search(self, query, size).await
    }
}

/// Accepts absolute `http`/`https` URLs only.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|err| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

/// Trims, drops blanks and duplicates, keeps service order, caps at `size`.
fn normalize_suggestions(raw: Vec<String>, size: usize) -> Vec<SuggestionItem> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty() && seen.insert(text.clone()))
        .take(size)
        .map(SuggestionItem::new)
        .collect()
}
