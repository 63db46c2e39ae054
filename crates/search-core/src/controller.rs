use prompt_search_client::SuggestionItem;
use serde::Serialize;
use tracing::debug;

use crate::events::InputEvent;
use crate::fetcher::{FetchOutcome, SuggestionFetcher};

/// What the search box currently shows.
///
/// `selected_index` is `None` or a valid index into `suggestions`.
/// `dropdown_visible` implies the trimmed input meets the suggestion threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InteractionState {
    pub input_text: String,
    pub suggestions: Vec<SuggestionItem>,
    pub selected_index: Option<usize>,
    pub dropdown_visible: bool,
}

impl InteractionState {
    pub fn selected(&self) -> Option<&SuggestionItem> {
        self.selected_index.and_then(|index| self.suggestions.get(index))
    }

    fn can_navigate(&self) -> bool {
        self.dropdown_visible && !self.suggestions.is_empty()
    }
}

/// Requests the controller hands to the search session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Submit(String),
    SelectSuggestion(String),
}

/// Keyboard and pointer state machine for the search box.
pub struct SearchInputController {
    state: InteractionState,
    fetcher: SuggestionFetcher,
}

impl SearchInputController {
    pub fn new(fetcher: SuggestionFetcher) -> Self {
        Self {
            state: InteractionState::default(),
            fetcher,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn fetcher(&self) -> &SuggestionFetcher {
        &self.fetcher
    }

    pub fn handle(&mut self, event: InputEvent) -> Option<Intent> {
        match event {
            InputEvent::TextChanged(value) => {
                self.text_changed(value);
                None
            }
            InputEvent::ArrowDown => {
                if self.state.can_navigate() {
                    let len = self.state.suggestions.len();
                    self.state.selected_index = Some(match self.state.selected_index {
                        Some(index) => (index + 1) % len,
                        None => 0,
                    });
                }
                None
            }
            InputEvent::ArrowUp => {
                if self.state.can_navigate() {
                    let len = self.state.suggestions.len();
                    self.state.selected_index = Some(match self.state.selected_index {
                        Some(0) | None => len - 1,
                        Some(index) => index - 1,
                    });
                }
                None
            }
            InputEvent::Enter => self.enter(),
            InputEvent::Escape => {
                self.state.dropdown_visible = false;
                self.state.selected_index = None;
                None
            }
            InputEvent::SuggestionClicked(text) => Some(self.confirm(text)),
            InputEvent::ClearInvoked => {
                self.fetcher.cancel();
                self.state = InteractionState::default();
                None
            }
            InputEvent::FocusGained => {
                if self.fetcher.meets_threshold(&self.state.input_text) {
                    self.state.dropdown_visible = true;
                }
                None
            }
            InputEvent::ClickOutside => {
                self.state.dropdown_visible = false;
                None
            }
        }
    }

    /// Applies fetched suggestions unless the input has moved on since they were requested.
    pub fn apply_suggestions(&mut self, outcome: FetchOutcome) -> bool {
        if !self.fetcher.is_current(outcome.ticket)
            || outcome.query != self.state.input_text.trim()
        {
            debug!(
                target: "prompt_search_core",
                query = %outcome.query,
                input = %self.state.input_text,
                "ignoring suggestions for stale input"
            );
            return false;
        }

        self.state.suggestions = outcome.suggestions;
        self.state.selected_index = None;
        true
    }

    pub fn awaiting_suggestions(&self) -> bool {
        self.fetcher.is_pending()
    }

    pub async fn next_suggestions(&mut self) -> Option<FetchOutcome> {
        self.fetcher.next_outcome().await
    }

    pub fn try_next_suggestions(&mut self) -> Option<FetchOutcome> {
        self.fetcher.try_next_outcome()
    }

    fn text_changed(&mut self, value: String) {
        let above_threshold = self.fetcher.meets_threshold(&value);
        self.state.selected_index = None;
        self.state.dropdown_visible = above_threshold;
        if above_threshold {
            self.fetcher.dispatch(&value);
        } else {
            self.fetcher.cancel();
            self.state.suggestions.clear();
        }
        self.state.input_text = value;
    }

    fn enter(&mut self) -> Option<Intent> {
        if self.state.can_navigate() {
            if let Some(item) = self.state.selected().cloned() {
                return Some(self.confirm(item.text));
            }
        }

        if self.state.input_text.trim().is_empty() {
            debug!(target: "prompt_search_core", "enter on blank input; nothing to submit");
            return None;
        }
        self.state.dropdown_visible = false;
        Some(Intent::Submit(self.state.input_text.clone()))
    }

    fn confirm(&mut self, text: String) -> Intent {
        self.fetcher.cancel();
        self.state.input_text = text.clone();
        self.state.dropdown_visible = false;
        Intent::SelectSuggestion(text)
    }
}
