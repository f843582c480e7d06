use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process exclusive locks keyed by storage key.
///
/// Writers that must read a key and then write it hold the key's lock for the
/// duration. Locks on different keys never contend with each other. Entries
/// are removed once the last holder or waiter lets go.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits on this key.
        self.inflight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.inflight.entry(key.to_string()).or_default().value())
    }

    fn guard(&self, key: &str, guard: OwnedMutexGuard<()>) -> KeyGuard {
        KeyGuard {
            guard: Some(guard),
            inflight: Arc::clone(&self.inflight),
            key: key.to_string(),
        }
    }

    /// Take the lock without waiting. `None` if someone else holds it.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard> {
        self.mutex(key)
            .try_lock_owned()
            .ok()
            .map(|guard| self.guard(key, guard))
    }

    /// Wait up to `timeout` for the lock. Waiters are served in FIFO order.
    pub async fn lock(&self, key: &str, timeout: Duration) -> Option<KeyGuard> {
        match tokio::time::timeout(timeout, self.mutex(key).lock_owned()).await {
            Ok(guard) => Some(self.guard(key, guard)),
            Err(_) => {
                self.inflight
                    .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
                None
            }
        }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.inflight
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn try_lock_is_exclusive_until_dropped() {
        let locks = KeyLocks::new();
        let guard = locks.try_lock("seat:1").unwrap();
        assert!(locks.try_lock("seat:1").is_none());
        assert!(locks.try_lock("seat:2").is_some());

        drop(guard);
        assert!(!locks.is_locked("seat:1"));
        assert!(locks.try_lock("seat:1").is_some());
    }

    #[tokio::test]
    async fn lock_waits_for_release() {
        let locks = KeyLocks::new();
        let guard = locks.try_lock("ticket:1").unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock("ticket:1", Duration::from_secs(2)).await.is_some() })
        };
        sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn lock_gives_up_after_timeout() {
        let locks = KeyLocks::new();
        let _guard = locks.try_lock("ticket:1").unwrap();
        assert!(locks.lock("ticket:1", Duration::from_millis(10)).await.is_none());
        assert!(locks.is_locked("ticket:1"));
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let locks = KeyLocks::new();
        let guard = locks.try_lock("ticket:7").unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut waiters = Vec::new();
        for i in 0..4 {
            let locks = locks.clone();
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let _held = locks.lock("ticket:7", Duration::from_secs(2)).await.unwrap();
                order.lock().unwrap().push(i);
            }));
            // Let each waiter enqueue before the next one starts.
            sleep(Duration::from_millis(10)).await;
        }
        drop(guard);
        for waiter in waiters {
            waiter.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let locks = KeyLocks::new();
        {
            let _a = locks.try_lock("seat:1").unwrap();
            let _b = locks.try_lock("seat:2").unwrap();
            assert!(locks.try_lock("seat:1").is_none());
            assert_eq!(locks.tracked_keys(), 2);
        }
        assert!(locks.lock("seat:3", Duration::from_millis(10)).await.is_some());
        assert_eq!(locks.tracked_keys(), 0);
    }
}
