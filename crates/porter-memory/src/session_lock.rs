//! Per-session-key mutual exclusion.
//!
//! Two simultaneous requests for the same session key (a double-submit
//! from a slow client) would otherwise race on the session's
//! read-modify-write and lose stage/message-count updates.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Default)]
pub struct SessionLockManager {
    locks: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl SessionLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to one session key. The returned guard
    /// releases the lock on drop.
    pub async fn acquire(&self, session_key: &str) -> SessionLockGuard {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            // Sweep idle keys so the map does not grow for the life of
            // the process. A semaphore in use has clones outside the
            // map: permits hold one, as does any acquire in flight.
            locks.retain(|key, sem| key == session_key || Arc::strong_count(sem) > 1);
            locks
                .entry(session_key.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        // The semaphore is never closed, so acquire cannot fail.
        let permit = semaphore
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("session semaphore closed"));
        SessionLockGuard { _permit: permit }
    }
}

pub struct SessionLockGuard {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let manager = SessionLockManager::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let m1 = manager.clone();
        let c1 = counter.clone();
        let t1 = tokio::spawn(async move {
            let _guard = m1.acquire("visitor-1").await;
            c1.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            c1.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let m2 = manager.clone();
        let c2 = counter.clone();
        let t2 = tokio::spawn(async move {
            let _guard = m2.acquire("visitor-1").await;
            assert!(c2.load(Ordering::SeqCst) >= 2);
        });

        t1.await.unwrap();
        t2.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_run_in_parallel() {
        let manager = SessionLockManager::new();
        let _held = manager.acquire("visitor-1").await;

        // A different key must not block behind visitor-1.
        let acquired = tokio::time::timeout(
            Duration::from_millis(100),
            manager.acquire("visitor-2"),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn idle_keys_are_swept_on_acquire() {
        let manager = SessionLockManager::new();
        let held = manager.acquire("busy").await;
        for i in 0..32 {
            drop(manager.acquire(&format!("visitor-{i}")).await);
        }
        drop(manager.acquire("latest").await);

        let locks = manager.locks.lock().await;
        assert!(locks.contains_key("busy"));
        assert!(locks.len() <= 2);
        drop(held);
    }
}
