//! Cost-per-second accounting for external calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Length of the accounting window.
const WINDOW: Duration = Duration::from_secs(1);

/// Records per-call costs over a sliding one-second window.
///
/// Bookkeeping only: nothing here throttles. Callers read
/// [`CostLedger::cost_per_second`] and decide for themselves.
pub struct CostLedger {
    window: Mutex<VecDeque<(Instant, u32)>>,
    total: AtomicU64,
}

impl CostLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Record one call's cost.
    pub fn record(&self, cost: u32) {
        self.total.fetch_add(cost as u64, Ordering::Relaxed);

        let mut window = self.window.lock();
        let now = Instant::now();
        prune(&mut window, now);
        window.push_back((now, cost));
    }

    /// Total cost recorded over the last second.
    pub fn cost_per_second(&self) -> u64 {
        let mut window = self.window.lock();
        prune(&mut window, Instant::now());
        window.iter().map(|(_, cost)| *cost as u64).sum()
    }

    /// Lifetime total cost.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn prune(window: &mut VecDeque<(Instant, u32)>, now: Instant) {
    while let Some((at, _)) = window.front() {
        if now.duration_since(*at) < WINDOW {
            break;
        }
        window.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_accumulate() {
        let ledger = CostLedger::new();
        ledger.record(5);
        ledger.record(1);

        assert_eq!(ledger.cost_per_second(), 6);
        assert_eq!(ledger.total(), 6);
    }

    #[test]
    fn test_window_slides() {
        let ledger = CostLedger::new();
        ledger.record(25);

        std::thread::sleep(Duration::from_millis(1050));

        ledger.record(1);
        assert_eq!(ledger.cost_per_second(), 1);
        assert_eq!(ledger.total(), 26);
    }
}
