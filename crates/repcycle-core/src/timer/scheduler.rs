//! Frame scheduling for clocks.
//!
//! A clock never sleeps or spawns anything. When it is running it asks the
//! scheduler for exactly one frame and the host calls `tick()` once that
//! frame is due. Cancelling is just dropping the token from the pending set.
//!
//! Two schedulers are provided:
//!
//! - [`SystemScheduler`]: monotonic wall clock, used by real hosts.
//! - [`ManualScheduler`]: time only moves when `advance()` is called, used by
//!   tests and simulations.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Instant;

/// Source of "now" in milliseconds. Only differences are meaningful.
pub trait TimeSource {
    fn now_ms(&self) -> u64;
}

/// Identifies one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameToken(u64);

/// Hands out frame wakeups and takes them back.
pub trait Scheduler: TimeSource {
    /// Request one wakeup. The returned token stays pending until cancelled.
    fn schedule(&self) -> FrameToken;

    /// Retire a token. Cancelling an unknown or already retired token is a no-op.
    fn cancel(&self, token: FrameToken);

    /// Number of tokens still pending, across every clock sharing this scheduler.
    fn pending(&self) -> usize;
}

/// Shared handle every clock keeps to its scheduler.
pub type SharedScheduler = Rc<dyn Scheduler>;

#[derive(Debug, Default)]
struct TokenBook {
    next: Cell<u64>,
    pending: RefCell<BTreeSet<u64>>,
}

impl TokenBook {
    fn issue(&self) -> FrameToken {
        let id = self.next.get();
        self.next.set(id + 1);
        self.pending.borrow_mut().insert(id);
        FrameToken(id)
    }

    fn retire(&self, token: FrameToken) {
        self.pending.borrow_mut().remove(&token.0);
    }

    fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Scheduler backed by `std::time::Instant`.
#[derive(Debug)]
pub struct SystemScheduler {
    origin: Instant,
    tokens: TokenBook,
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            tokens: TokenBook::default(),
        }
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemScheduler {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Scheduler for SystemScheduler {
    fn schedule(&self) -> FrameToken {
        self.tokens.issue()
    }

    fn cancel(&self, token: FrameToken) {
        self.tokens.retire(token);
    }

    fn pending(&self) -> usize {
        self.tokens.len()
    }
}

/// Deterministic scheduler: time is whatever the test says it is.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Cell<u64>,
    tokens: TokenBook,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the manual clock at an arbitrary instant.
    pub fn starting_at(now_ms: u64) -> Self {
        let scheduler = Self::default();
        scheduler.now.set(now_ms);
        scheduler
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    pub fn set_now(&self, now_ms: u64) {
        self.now.set(now_ms);
    }
}

impl TimeSource for ManualScheduler {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self) -> FrameToken {
        self.tokens.issue()
    }

    fn cancel(&self, token: FrameToken) {
        self.tokens.retire(token);
    }

    fn pending(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_cancellable() {
        let s = ManualScheduler::new();
        let a = s.schedule();
        let b = s.schedule();
        assert_ne!(a, b);
        assert_eq!(s.pending(), 2);

        s.cancel(a);
        s.cancel(a);
        assert_eq!(s.pending(), 1);
        s.cancel(b);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn manual_time_only_moves_on_advance() {
        let s = ManualScheduler::starting_at(1_000);
        assert_eq!(s.now_ms(), 1_000);
        s.advance(250);
        assert_eq!(s.now_ms(), 1_250);
        s.set_now(10);
        assert_eq!(s.now_ms(), 10);
    }

    #[test]
    fn system_time_is_monotonic() {
        let s = SystemScheduler::new();
        let a = s.now_ms();
        let b = s.now_ms();
        assert!(b >= a);
    }
}
