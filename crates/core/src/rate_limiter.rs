//! Dispatch pacing
//!
//! A single [`DispatchPacer`] is shared by every worker of a pool, so the
//! configured delay bounds the *global* dispatch rate rather than the rate
//! of each worker.

use std::time::Duration;
use tokio::time::Instant;

/// Fixed-interval pacer: consecutive dispatches are at least `interval` apart
#[derive(Debug, Clone)]
pub struct DispatchPacer {
    /// Minimum spacing between two dispatches
    interval: Duration,
    /// Time of the last dispatch
    last_dispatch: Option<Instant>,
}

impl DispatchPacer {
    /// Create a pacer with the given spacing
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    /// Instant at which the next dispatch may happen
    pub fn next_slot(&self) -> Instant {
        match self.last_dispatch {
            Some(last) => last + self.interval,
            None => Instant::now(),
        }
    }

    /// Record that a dispatch happened now
    pub fn mark_dispatched(&mut self) {
        self.last_dispatch = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep_until;

    #[tokio::test(start_paused = true)]
    async fn test_first_dispatch_is_immediate() {
        let pacer = DispatchPacer::new(Duration::from_secs(1));
        assert!(pacer.next_slot() <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_are_spaced() {
        let mut pacer = DispatchPacer::new(Duration::from_millis(200));
        let start = Instant::now();
        for _ in 0..5 {
            sleep_until(pacer.next_slot()).await;
            pacer.mark_dispatched();
        }
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(pacer.next_slot() - Instant::now(), Duration::from_millis(200));
    }
}
