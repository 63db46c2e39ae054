//! User input as plain events, delivered through scoped subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Everything the search box reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InputEvent {
    TextChanged(String),
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    SuggestionClicked(String),
    ClearInvoked,
    FocusGained,
    ClickOutside,
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: DashMap<u64, mpsc::UnboundedSender<InputEvent>>,
}

/// Fan-out point for input events. Cloning shares the same subscriber set.
#[derive(Debug, Clone, Default)]
pub struct InputHub {
    inner: Arc<HubInner>,
}

impl InputHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.insert(id, sender);
        debug!(target: "prompt_search_core", subscription = id, "input subscription acquired");
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
            receiver,
        }
    }

    /// Delivers `event` to every live subscriber and returns how many received it.
    pub fn publish(&self, event: &InputEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.inner.subscribers.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.inner.subscribers.remove(&id);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// Receiving end of an [`InputHub`]. Unregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    hub: Weak<HubInner>,
    receiver: mpsc::UnboundedReceiver<InputEvent>,
}

impl Subscription {
    /// Next event, or `None` once the hub is gone and the backlog is drained.
    pub async fn recv(&mut self) -> Option<InputEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InputEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            inner.subscribers.remove(&self.id);
            debug!(target: "prompt_search_core", subscription = self.id, "input subscription released");
        }
    }
}
