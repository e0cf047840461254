//! Per-tool result slot that discards stale responses.
//!
//! Requests are not cancellable, so an older call can finish after a newer
//! one. Each call takes a [`RequestTicket`] when it starts; only the ticket
//! issued last may store its result.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

/// Identifies one issued request within a [`ResultSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Holds the latest accepted result for one tool.
#[derive(Debug)]
pub struct ResultSlot<T> {
    next_id: AtomicU64,
    state: Mutex<SlotState<T>>,
}

#[derive(Debug)]
struct SlotState<T> {
    latest_issued: u64,
    value: Option<(RequestTicket, T)>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(SlotState {
                latest_issued: 0,
                value: None,
            }),
        }
    }

    /// Start a new request. Any ticket issued earlier becomes stale.
    pub fn issue(&self) -> RequestTicket {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.latest_issued = state.latest_issued.max(id);
        RequestTicket(id)
    }

    /// Store `value` if `ticket` is the most recently issued one.
    ///
    /// Returns `false` (and drops `value`) for a stale ticket.
    pub fn complete(&self, ticket: RequestTicket, value: T) -> bool {
        let mut state = self.state.lock();
        if ticket.0 != state.latest_issued {
            debug!(
                ticket = ticket.0,
                latest = state.latest_issued,
                "discarding stale result"
            );
            return false;
        }
        state.value = Some((ticket, value));
        true
    }

    /// `true` if `ticket` is still the latest issued.
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.state.lock().latest_issued == ticket.0
    }

    pub fn clear(&self) {
        self.state.lock().value = None;
    }

    pub fn take(&self) -> Option<T> {
        self.state.lock().value.take().map(|(_, v)| v)
    }
}

impl<T: Clone> ResultSlot<T> {
    /// Snapshot of the stored result.
    pub fn latest(&self) -> Option<T> {
        self.state.lock().value.as_ref().map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_response_from_older_request_is_discarded() {
        let slot = ResultSlot::new();
        let first = slot.issue();
        let second = slot.issue();

        assert!(slot.complete(second, "newer"));
        assert!(!slot.complete(first, "older"));
        assert_eq!(slot.latest(), Some("newer"));
    }

    #[test]
    fn stale_ticket_cannot_write_before_newer_completes() {
        let slot = ResultSlot::new();
        let first = slot.issue();
        let second = slot.issue();

        assert!(!slot.complete(first, 1));
        assert_eq!(slot.latest(), None);
        assert!(slot.is_current(second));
        assert!(slot.complete(second, 2));
        assert_eq!(slot.take(), Some(2));
        assert_eq!(slot.latest(), None);
    }

    #[test]
    fn tickets_increase_monotonically() {
        let slot: ResultSlot<()> = ResultSlot::default();
        let ids: Vec<u64> = (0..5).map(|_| slot.issue().id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn clear_empties_the_slot() {
        let slot = ResultSlot::new();
        let t = slot.issue();
        slot.complete(t, 5u8);
        slot.clear();
        assert_eq!(slot.latest(), None);
    }
}
