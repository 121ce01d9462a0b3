//! Advisory async lock with FIFO waiters.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// An advisory, single-process, non-reentrant async lock.
///
/// Waiters are granted the lock strictly in the order their `acquire` calls
/// were made; the backing tokio semaphore is fair, so a long queue never
/// starves its head. Holding a [`LockGuard`] across `.await` points is the
/// intended use.
pub struct Mutex {
    semaphore: Arc<Semaphore>,
}

impl Mutex {
    /// Create an unlocked mutex.
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait for the lock and return a release handle.
    pub async fn acquire(&self) -> LockGuard {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is private and never closed.
            Err(closed) => unreachable!("lock semaphore closed: {closed}"),
        };
        LockGuard {
            permit: Some(permit),
        }
    }

    /// Take the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<LockGuard> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| LockGuard {
                permit: Some(permit),
            })
    }

    /// Returns true if some caller currently holds the lock.
    pub fn locked(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Release handle returned by [`Mutex::acquire`].
///
/// The lock is handed to the next waiter on [`LockGuard::release`] or when
/// the guard is dropped, whichever comes first. Releasing an already
/// released guard is a no-op.
pub struct LockGuard {
    permit: Option<OwnedSemaphorePermit>,
}

impl LockGuard {
    /// Release the lock. Idempotent.
    pub fn release(&mut self) {
        self.permit.take();
    }

    /// Returns true if this guard no longer holds the lock.
    pub fn is_released(&self) -> bool {
        self.permit.is_none()
    }
}
