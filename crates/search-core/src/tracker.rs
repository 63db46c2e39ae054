use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Sequence number captured when a request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing tickets; only the most recent one is current.
///
/// Clones share the same counter, so a spawned request can check whether it
/// has been superseded without holding a reference to its dispatcher.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Makes every outstanding ticket stale without issuing a new request.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_ticket_is_current() {
        let tracker = RequestTracker::new();
        let first = tracker.issue();
        let second = tracker.issue();

        assert!(first < second);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn invalidate_retires_outstanding_ticket() {
        let tracker = RequestTracker::new();
        let ticket = tracker.issue();
        tracker.invalidate();
        assert!(!tracker.is_current(ticket));
    }

    #[test]
    fn clones_share_sequence() {
        let tracker = RequestTracker::new();
        let observer = tracker.clone();
        let ticket = tracker.issue();
        assert!(observer.is_current(ticket));
        observer.issue();
        assert!(!tracker.is_current(ticket));
    }
}
