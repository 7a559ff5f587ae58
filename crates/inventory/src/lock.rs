//! Named distributed locks with lease expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{InventoryError, Result};

/// Opaque holder token returned by [`DistributedLock::acquire`].
///
/// Release requires the token, so a holder whose lease expired cannot
/// release the lock from its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockToken(u64);

/// Acquisition and lease bounds for a lock service.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// How long an acquirer waits for the lock before giving up.
    pub wait_timeout: Duration,

    /// How long a holder may keep the lock before it force-expires.
    pub lease: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            lease: Duration::from_secs(3),
        }
    }
}

/// A named lock shared across workers.
///
/// Acquisition blocks up to the configured wait bound and fails with
/// [`InventoryError::LockTimeout`] afterwards. A holder that never
/// releases loses the lock when its lease expires, so a crashed worker
/// cannot block the key forever.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquires the named lock, returning the holder token.
    async fn acquire(&self, key: &str) -> Result<LockToken>;

    /// Releases the lock if `token` still identifies the current holder.
    /// A stale token (lease already expired and re-acquired) is a no-op.
    async fn release(&self, key: &str, token: LockToken) -> Result<()>;
}

struct Holder {
    token: LockToken,
    expires_at: Instant,
}

/// Process-local lock service with the same acquisition semantics a
/// Redis-backed implementation would have: bounded wait, lease expiry,
/// release by holder token.
#[derive(Clone)]
pub struct InMemoryLockService {
    config: LockConfig,
    holders: Arc<Mutex<HashMap<String, Holder>>>,
    next_token: Arc<AtomicU64>,
}

impl InMemoryLockService {
    /// Creates a lock service with the default bounds (wait 5s, lease 3s).
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    /// Creates a lock service with explicit bounds.
    pub fn with_config(config: LockConfig) -> Self {
        Self {
            config,
            holders: Arc::new(Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> LockConfig {
        self.config
    }

    /// Attempts a single non-blocking acquisition.
    async fn try_acquire(&self, key: &str) -> Option<LockToken> {
        let mut holders = self.holders.lock().await;
        let now = Instant::now();

        if let Some(holder) = holders.get(key)
            && holder.expires_at > now
        {
            return None;
        }

        if holders.contains_key(key) {
            tracing::warn!(key, "lock lease expired, taking over");
            metrics::counter!("lock_lease_expired_total").increment(1);
        }

        let token = LockToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        holders.insert(
            key.to_string(),
            Holder {
                token,
                expires_at: now + self.config.lease,
            },
        );
        Some(token)
    }
}

impl Default for InMemoryLockService {
    fn default() -> Self {
        Self::new()
    }
}

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[async_trait]
impl DistributedLock for InMemoryLockService {
    async fn acquire(&self, key: &str) -> Result<LockToken> {
        let deadline = Instant::now() + self.config.wait_timeout;

        loop {
            if let Some(token) = self.try_acquire(key).await {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                metrics::counter!("lock_acquire_timeouts_total").increment(1);
                return Err(InventoryError::LockTimeout {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await;
        }
    }

    async fn release(&self, key: &str, token: LockToken) -> Result<()> {
        let mut holders = self.holders.lock().await;
        if let Some(holder) = holders.get(key)
            && holder.token == token
        {
            holders.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> LockConfig {
        LockConfig {
            wait_timeout: Duration::from_millis(100),
            lease: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn acquire_then_release_then_reacquire() {
        let locks = InMemoryLockService::with_config(fast_config());

        let token = locks.acquire("lock:menu:stock:a").await.unwrap();
        locks.release("lock:menu:stock:a", token).await.unwrap();
        locks.acquire("lock:menu:stock:a").await.unwrap();
    }

    #[tokio::test]
    async fn second_acquirer_times_out_while_held() {
        let locks = InMemoryLockService::with_config(LockConfig {
            wait_timeout: Duration::from_millis(50),
            lease: Duration::from_secs(10),
        });

        let _held = locks.acquire("k").await.unwrap();
        let result = locks.acquire("k").await;
        assert!(matches!(result, Err(InventoryError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = InMemoryLockService::with_config(fast_config());

        let _a = locks.acquire("k1").await.unwrap();
        locks.acquire("k2").await.unwrap();
    }

    #[tokio::test]
    async fn lease_expiry_unblocks_next_acquirer() {
        let locks = InMemoryLockService::with_config(LockConfig {
            wait_timeout: Duration::from_millis(500),
            lease: Duration::from_millis(50),
        });

        // Held and never released.
        let _abandoned = locks.acquire("k").await.unwrap();

        // Succeeds once the lease runs out, well within the wait bound.
        locks.acquire("k").await.unwrap();
    }

    #[tokio::test]
    async fn stale_release_does_not_free_successors_lock() {
        let locks = InMemoryLockService::with_config(LockConfig {
            wait_timeout: Duration::from_millis(50),
            lease: Duration::from_millis(300),
        });

        let stale = locks.acquire("k").await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        let _successor = locks.acquire("k").await.unwrap();

        // The expired holder's release is a no-op.
        locks.release("k", stale).await.unwrap();

        // The successor's lease (300ms) outlives the wait bound (50ms),
        // so the lock must still be held.
        let result = locks.acquire("k").await;
        assert!(matches!(result, Err(InventoryError::LockTimeout { .. })));
    }

    #[tokio::test]
    async fn waiting_acquirer_gets_lock_after_release() {
        let locks = InMemoryLockService::with_config(LockConfig {
            wait_timeout: Duration::from_millis(500),
            lease: Duration::from_secs(10),
        });

        let token = locks.acquire("k").await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("k").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        locks.release("k", token).await.unwrap();

        waiter.await.unwrap().unwrap();
    }
}
