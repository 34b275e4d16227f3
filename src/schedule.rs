//! Cooperative scheduling primitives: cancellation tokens for incremental
//! generation passes and a debouncer for expensive recomputation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay before an idle slot runs, leaving room for pending frames.
pub const IDLE_DELAY: Duration = Duration::from_millis(1);

/// Soft time budget of one idle slot.
pub const IDLE_BUDGET: Duration = Duration::from_millis(50);

/// Quiet period before a burst of changes triggers recomputation.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Owned handle to one incremental generation pass.
///
/// Every scheduled chunk carries a clone; the generator checks it before
/// appending anything. Cancelling is idempotent.
#[derive(Clone, Debug)]
pub struct GenerationToken {
    pass: u64,
    cancelled: Arc<AtomicBool>,
}

impl GenerationToken {
    pub(crate) fn new(pass: u64) -> Self {
        Self {
            pass,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl PartialEq for GenerationToken {
    fn eq(&self, other: &Self) -> bool {
        self.pass == other.pass
    }
}

/// Resolves after [`IDLE_DELAY`], handing the token back to whoever runs the
/// next chunk.
pub async fn idle_slot(token: GenerationToken) -> GenerationToken {
    tokio::time::sleep(IDLE_DELAY).await;
    token
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// Collapses a burst of requests into the last one.
#[derive(Debug, Default)]
pub struct Debouncer {
    latest: u64,
    fired: bool,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes every earlier ticket.
    pub fn schedule(&mut self) -> Ticket {
        self.latest += 1;
        self.fired = false;
        Ticket(self.latest)
    }

    /// True exactly once, for the most recent ticket.
    pub fn fire(&mut self, ticket: Ticket) -> bool {
        if ticket.0 != self.latest || self.fired {
            return false;
        }
        self.fired = true;
        true
    }

    /// Drops whatever is pending, e.g. when the work ran immediately instead.
    pub fn cancel(&mut self) {
        self.fired = true;
    }
}

pub async fn settle(delay: Duration, ticket: Ticket) -> Ticket {
    tokio::time::sleep(delay).await;
    ticket
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_is_idempotent() {
        let token = GenerationToken::new(3);
        let copy = token.clone();
        assert!(!copy.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(copy.is_cancelled());
        assert_eq!(copy.pass(), 3);
    }

    #[test]
    fn only_the_latest_ticket_fires() {
        let mut debouncer = Debouncer::new();
        let first = debouncer.schedule();
        let second = debouncer.schedule();
        assert!(!debouncer.fire(first));
        assert!(debouncer.fire(second));
        assert!(!debouncer.fire(second));
    }

    #[test]
    fn cancel_drops_pending_ticket() {
        let mut debouncer = Debouncer::new();
        let ticket = debouncer.schedule();
        debouncer.cancel();
        assert!(!debouncer.fire(ticket));
    }

    #[tokio::test]
    async fn settle_hands_back_its_ticket() {
        let mut debouncer = Debouncer::new();
        let ticket = debouncer.schedule();
        let settled = settle(Duration::from_millis(1), ticket).await;
        assert!(debouncer.fire(settled));
    }
}
