//! Per-thread turn serialization.
//!
//! Each thread ID maps to a `Semaphore(1)`. A second request on the same
//! thread waits for the running turn to finish, so it observes the first
//! turn's persisted state, never a half-written one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ThreadLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ThreadLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the turn lock for a thread; held for the duration of the
    /// turn and released on drop.
    pub async fn acquire(&self, thread_id: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        // The semaphore is never closed, so acquire cannot fail.
        sem.acquire_owned().await.expect("thread lock semaphore closed")
    }

    pub fn thread_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody currently holds.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, sem| sem.available_permits() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_turns_on_one_thread() {
        let map = ThreadLockMap::new();
        let p1 = map.acquire("t1").await;
        drop(p1);
        let p2 = map.acquire("t1").await;
        drop(p2);
    }

    #[tokio::test]
    async fn different_threads_are_concurrent() {
        let map = ThreadLockMap::new();
        let _p1 = map.acquire("t1").await;
        let _p2 = map.acquire("t2").await;
        assert_eq!(map.thread_count(), 2);
    }

    #[tokio::test]
    async fn second_turn_waits_for_first() {
        let map = Arc::new(ThreadLockMap::new());
        let p1 = map.acquire("t1").await;

        let map2 = map.clone();
        let waiter = tokio::spawn(async move {
            let _p2 = map2.acquire("t1").await;
            7
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(p1);
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn prune_drops_idle_locks() {
        let map = ThreadLockMap::new();
        {
            let _p = map.acquire("t1").await;
            map.prune_idle();
            assert_eq!(map.thread_count(), 1);
        }
        map.prune_idle();
        assert_eq!(map.thread_count(), 0);
    }
}
