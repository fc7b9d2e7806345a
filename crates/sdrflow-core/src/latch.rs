//! Two-phase countdown latch.
//!
//! The graph resets a latch to the number of subgraph threads it is about to
//! spawn. Each thread calls [`Latch::arrive_and_wait`]; the controlling thread
//! calls [`Latch::wait`]. Everyone is released once the count reaches zero.
//! Unlike [`std::sync::Barrier`] the participant count is set per run and the
//! controller does not count as a participant.

use parking_lot::{Condvar, Mutex};

/// Countdown latch reusable across runs via [`Latch::reset`].
#[derive(Debug, Default)]
pub struct Latch {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl Latch {
    /// Creates a latch that is already open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arms the latch for `count` arrivals.
    pub fn reset(&self, count: usize) {
        *self.remaining.lock() = count;
    }

    /// Decrements the count, then blocks until it reaches zero.
    pub fn arrive_and_wait(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.released.notify_all();
            return;
        }
        self.released.wait_while(&mut remaining, |r| *r > 0);
    }

    /// Blocks until the count reaches zero without arriving.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        self.released.wait_while(&mut remaining, |r| *r > 0);
    }

    /// Releases every waiter regardless of outstanding arrivals.
    pub fn open(&self) {
        *self.remaining.lock() = 0;
        self.released.notify_all();
    }

    /// Arrivals still outstanding.
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}
