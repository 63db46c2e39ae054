//! Turns service-marked highlight fragments into display spans.
//!
//! The search service wraps matched terms in `<em>`/`</em>`. Splitting on either
//! tag yields segments that alternate plain, emphasized, plain, ... starting
//! with plain. Empty segments are kept so the alternation stays positional.

use once_cell::sync::Lazy;
use prompt_search_client::SearchResultItem;
use regex::Regex;
use serde::Serialize;

static EMPHASIS_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?em>").expect("emphasis delimiter regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub emphasized: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// Formats one field. Only the first marked fragment is used; without any,
/// the raw text comes back as a single plain span.
pub fn format_highlight(raw_text: &str, markers: Option<&[String]>) -> Vec<Span> {
    let Some(marked) = markers.and_then(|fragments| fragments.first()) else {
        return vec![Span::plain(raw_text)];
    };

    EMPHASIS_DELIMITER
        .split(marked)
        .enumerate()
        .map(|(position, segment)| Span {
            text: segment.to_string(),
            emphasized: position % 2 == 1,
        })
        .collect()
}

pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// A result prepared for display: both fields already split into spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub prompt: Vec<Span>,
    pub query: Vec<Span>,
    pub score: f64,
    pub match_percentage: u8,
}

impl From<&SearchResultItem> for ResultRow {
    fn from(item: &SearchResultItem) -> Self {
        let highlight = item.highlight.as_ref();
        Self {
            prompt: format_highlight(
                &item.prompt,
                highlight.and_then(|h| h.prompt.as_deref()),
            ),
            query: format_highlight(&item.query, highlight.and_then(|h| h.query.as_deref())),
            score: item.score,
            match_percentage: item.match_percentage,
        }
    }
}
