use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// A single autocomplete candidate. Position in the returned list is its only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub text: String,
}

impl SuggestionItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Highlighted fragments per field, as returned by the service.
///
/// Each fragment carries `<em>`/`</em>` markers around the matched terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub prompt: Option<Vec<String>>,
    #[serde(default)]
    pub query: Option<Vec<String>>,
}

impl Highlight {
    pub fn is_empty(&self) -> bool {
        self.prompt.as_ref().map_or(true, Vec::is_empty)
            && self.query.as_ref().map_or(true, Vec::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(
        default,
        alias = "matchPercentage",
        deserialize_with = "percentage"
    )]
    pub match_percentage: u8,
    #[serde(default, deserialize_with = "empty_highlight_as_none")]
    pub highlight: Option<Highlight>,
}

/// Ordered page of results. `total` and `took_millis` are reported by the service verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultSet {
    pub items: Vec<SearchResultItem>,
    pub total: u64,
    pub took_millis: u64,
}

impl From<SearchResponse> for SearchResultSet {
    fn from(response: SearchResponse) -> Self {
        Self {
            items: response.hits,
            total: response.total,
            took_millis: response.took,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutocompleteResponse {
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchResultItem>,
    pub total: u64,
    pub took: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub elasticsearch_connected: bool,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cluster_health: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: OffsetDateTime,
    pub last_accessed: OffsetDateTime,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.clamp(0.0, 100.0) as u8)
}

fn empty_highlight_as_none<'de, D>(deserializer: D) -> Result<Option<Highlight>, D::Error>
where
    D: Deserializer<'de>,
{
    let highlight = Option::<Highlight>::deserialize(deserializer)?;
    Ok(highlight.filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_response_passes_totals_through() {
        let payload = json!({
            "total": 1532,
            "took": 42,
            "suggestions": [],
            "hits": [
                {
                    "prompt": "red dress",
                    "query": "dress",
                    "score": 7.5,
                    "match_percentage": 100,
                    "highlight": {"prompt": ["red <em>dress</em>"]}
                },
                {
                    "prompt": "blue jeans",
                    "query": "jeans",
                    "score": 3.1,
                    "match_percentage": 41,
                    "highlight": {}
                }
            ]
        });

        let response: SearchResponse = serde_json::from_value(payload).unwrap();
        let set = SearchResultSet::from(response);

        assert_eq!(set.total, 1532);
        assert_eq!(set.took_millis, 42);
        assert_eq!(set.items[0].prompt, "red dress");
        assert_eq!(set.items[1].prompt, "blue jeans");
        assert_eq!(
            set.items[0].highlight.as_ref().and_then(|h| h.prompt.clone()),
            Some(vec!["red <em>dress</em>".to_string()])
        );
        assert!(set.items[1].highlight.is_none());
    }

    #[test]
    fn tolerates_null_score_and_out_of_range_percentage() {
        let item: SearchResultItem = serde_json::from_value(json!({
            "prompt": "x",
            "query": null,
            "score": null,
            "matchPercentage": 250
        }))
        .unwrap();

        assert_eq!(item.query, "");
        assert!(item.score.abs() < f64::EPSILON);
        assert_eq!(item.match_percentage, 100);
        assert!(item.highlight.is_none());
    }

    #[test]
    fn health_report_recognizes_healthy_status() {
        let report: HealthReport = serde_json::from_value(json!({
            "status": "healthy",
            "elasticsearch_connected": true,
            "cluster_name": "docker-cluster",
            "cluster_health": "yellow"
        }))
        .unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.cluster_health.as_deref(), Some("yellow"));
    }
}
