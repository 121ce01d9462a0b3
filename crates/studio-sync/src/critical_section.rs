//! Serialized execution of queued async work.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Runs guarded async work in strict arrival order.
///
/// Each [`CriticalSection::guard`] call is chained behind the previous one:
/// the new work starts only once all earlier guarded work has settled,
/// whether it succeeded, failed, or was cancelled. Settlement is tracked by
/// the chain only; the value returned by `guard` is always the guarded
/// work's own outcome.
///
/// The section keeps a nesting depth. When it drops back to zero the chain
/// link is released, so an idle section holds no allocations and a later
/// `guard` starts a fresh chain.
pub struct CriticalSection {
    state: Arc<Mutex<SectionState>>,
}

struct SectionState {
    tail: Option<watch::Receiver<bool>>,
    depth: usize,
}

impl CriticalSection {
    /// Create an idle section.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SectionState {
                tail: None,
                depth: 0,
            })),
        }
    }

    /// Queue `work` behind everything guarded so far and run it.
    ///
    /// The closure is not invoked until every earlier guarded call has
    /// settled. Failures of earlier work only sequence the chain; they are
    /// not propagated here.
    pub async fn guard<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (mut link, predecessor) = {
            let mut state = self.state.lock();
            let (done_tx, done_rx) = watch::channel(false);
            state.depth += 1;
            let predecessor = state.tail.replace(done_rx);
            (
                SettleLink {
                    done: Some(done_tx),
                    predecessor: predecessor.clone(),
                    state: Arc::clone(&self.state),
                },
                predecessor,
            )
        };

        // The link settles on every exit path, including cancellation, so a
        // dropped guard can never wedge its successors. A guard dropped
        // while still queued keeps its slot until the predecessor settles.
        if let Some(rx) = predecessor {
            await_settled(rx).await;
            link.predecessor = None;
        }

        work().await
    }

    /// Wait until all work queued at the time of this call has settled.
    ///
    /// Does not join the chain: `guard` calls made after `wait` returns are
    /// not delayed by it.
    pub async fn wait(&self) {
        let tail = self.state.lock().tail.clone();
        if let Some(rx) = tail {
            await_settled(rx).await;
        }
    }

    /// Number of guarded calls currently queued or running.
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Returns true if no work is queued and the chain has been released.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.depth == 0 && state.tail.is_none()
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one chain link settled when dropped.
///
/// `predecessor` is present only while the guard is still queued behind
/// earlier work; the guard clears it once that work has settled.
struct SettleLink {
    done: Option<watch::Sender<bool>>,
    predecessor: Option<watch::Receiver<bool>>,
    state: Arc<Mutex<SectionState>>,
}

impl SettleLink {
    fn settle(done: watch::Sender<bool>, state: &Mutex<SectionState>) {
        done.send_replace(true);

        let mut state = state.lock();
        state.depth -= 1;
        if state.depth == 0 {
            state.tail = None;
        }
    }
}

impl Drop for SettleLink {
    fn drop(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };

        // Dropped while still queued: settling now would let successors
        // overtake the still-running predecessor, so the slot is held until
        // the predecessor settles.
        if let Some(rx) = self.predecessor.take() {
            if !*rx.borrow() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let state = Arc::clone(&self.state);
                    handle.spawn(async move {
                        await_settled(rx).await;
                        Self::settle(done, &state);
                    });
                    return;
                }
            }
        }

        Self::settle(done, &self.state);
    }
}

async fn await_settled(mut rx: watch::Receiver<bool>) {
    // A dropped sender counts as settled.
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::oneshot;
    use tokio::task::yield_now;

    #[tokio::test]
    async fn test_runs_in_arrival_order() {
        let section = Arc::new(CriticalSection::new());
        let order = Arc::new(SyncMutex::new(Vec::new()));
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let first = {
            let section = Arc::clone(&section);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        gate_rx.await.unwrap();
                        order.lock().push(1);
                    })
                    .await;
            })
        };
        yield_now().await;

        let second = {
            let section = Arc::clone(&section);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        order.lock().push(2);
                    })
                    .await;
            })
        };
        yield_now().await;

        // The second call must not start while the first is pending.
        assert!(order.lock().is_empty());
        assert_eq!(section.depth(), 2);

        gate_tx.send(()).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(*order.lock(), vec![1, 2]);
        assert_eq!(section.depth(), 0);
        assert!(section.is_idle());
    }

    #[tokio::test]
    async fn test_failure_settles_but_still_propagates() {
        let section = CriticalSection::new();

        let outcome: Result<(), &str> = section.guard(|| async { Err("capture failed") }).await;
        assert_eq!(outcome, Err("capture failed"));

        // The failed link must not block later work.
        let ran = section.guard(|| async { true }).await;
        assert!(ran);
        assert!(section.is_idle());
    }

    #[tokio::test]
    async fn test_cancelled_guard_does_not_wedge_successors() {
        let section = Arc::new(CriticalSection::new());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let blocked = {
            let section = Arc::clone(&section);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        gate_rx.await.ok();
                    })
                    .await;
            })
        };
        yield_now().await;

        let cancelled = {
            let section = Arc::clone(&section);
            tokio::spawn(async move {
                section.guard(|| async {}).await;
            })
        };
        yield_now().await;

        cancelled.abort();
        let _ = cancelled.await;

        let ran = Arc::new(AtomicBool::new(false));
        let third = {
            let section = Arc::clone(&section);
            let ran = Arc::clone(&ran);
            tokio::spawn(async move {
                section
                    .guard(|| async move {
                        ran.store(true, Ordering::SeqCst);
                    })
                    .await;
            })
        };
        yield_now().await;

        gate_tx.send(()).unwrap();
        blocked.await.unwrap();
        third.await.unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert!(section.is_idle());
    }

    #[tokio::test]
    async fn test_aborted_guard_keeps_successors_behind_running_work() {
        let section = Arc::new(CriticalSection::new());
        let order = Arc::new(SyncMutex::new(Vec::new()));
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let first = {
            let section = Arc::clone(&section);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        gate_rx.await.ok();
                        order.lock().push(1);
                    })
                    .await;
            })
        };
        yield_now().await;

        let second = {
            let section = Arc::clone(&section);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        order.lock().push(2);
                    })
                    .await;
            })
        };
        yield_now().await;

        second.abort();
        let _ = second.await;

        let third = {
            let section = Arc::clone(&section);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        order.lock().push(3);
                    })
                    .await;
            })
        };

        // Aborting the queued middle guard must not let the third one start
        // while the first is still running.
        for _ in 0..20 {
            yield_now().await;
        }
        assert!(order.lock().is_empty());

        gate_tx.send(()).unwrap();
        first.await.unwrap();
        third.await.unwrap();

        assert_eq!(*order.lock(), vec![1, 3]);
        assert!(section.is_idle());
    }

    #[tokio::test]
    async fn test_wait_observes_queued_work_without_joining() {
        let section = Arc::new(CriticalSection::new());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let running = {
            let section = Arc::clone(&section);
            tokio::spawn(async move {
                section
                    .guard(|| async {
                        gate_rx.await.unwrap();
                    })
                    .await;
            })
        };
        yield_now().await;

        let waited = Arc::new(AtomicBool::new(false));
        let waiter = {
            let section = Arc::clone(&section);
            let waited = Arc::clone(&waited);
            tokio::spawn(async move {
                section.wait().await;
                waited.store(true, Ordering::SeqCst);
            })
        };
        yield_now().await;
        assert!(!waited.load(Ordering::SeqCst));

        gate_tx.send(()).unwrap();
        running.await.unwrap();
        waiter.await.unwrap();
        assert!(waited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_idle_section_starts_fresh_chain() {
        let section = CriticalSection::new();

        section.guard(|| async {}).await;
        assert!(section.is_idle());

        let value = section.guard(|| async { 7 }).await;
        assert_eq!(value, 7);
        assert!(section.is_idle());
    }
}
