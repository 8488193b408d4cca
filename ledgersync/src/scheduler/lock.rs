//! Per-realm execution lock for scheduled runs.
//!
//! At most one scheduled run per connected realm executes at a time. The lock
//! carries a TTL so a crashed holder cannot wedge the schedule; a stale lock
//! is silently reclaimed by the next acquirer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::SyncResult;

/// Proof of lock ownership, required to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub realm_id: String,
    pub id: String,
}

/// Trait for the per-realm mutual exclusion primitive.
pub trait RealmLock {
    /// Attempts to acquire the lock for a realm.
    ///
    /// Returns `None` when another holder owns an unexpired lock.
    fn acquire(
        &self,
        realm_id: &str,
    ) -> impl Future<Output = SyncResult<Option<LockToken>>> + Send;

    /// Releases a held lock. Releasing an expired or already-released lock is
    /// a no-op.
    fn release(&self, token: LockToken) -> impl Future<Output = SyncResult<()>> + Send;
}

#[derive(Debug)]
struct Holder {
    token_id: String,
    expires_at: Instant,
}

/// In-memory realm lock with TTL expiry.
#[derive(Debug, Clone)]
pub struct MemoryRealmLock {
    ttl: Duration,
    holders: Arc<Mutex<HashMap<String, Holder>>>,
}

impl MemoryRealmLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            holders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_millis(ttl_ms: u64) -> Self {
        Self::new(Duration::from_millis(ttl_ms))
    }
}

impl RealmLock for MemoryRealmLock {
    async fn acquire(&self, realm_id: &str) -> SyncResult<Option<LockToken>> {
        let mut holders = self.holders.lock().await;
        let now = Instant::now();

        if let Some(holder) = holders.get(realm_id) {
            if holder.expires_at > now {
                return Ok(None);
            }
        }

        let token = LockToken {
            realm_id: realm_id.to_string(),
            id: Uuid::new_v4().to_string(),
        };
        holders.insert(
            realm_id.to_string(),
            Holder {
                token_id: token.id.clone(),
                expires_at: now + self.ttl,
            },
        );

        Ok(Some(token))
    }

    async fn release(&self, token: LockToken) -> SyncResult<()> {
        let mut holders = self.holders.lock().await;

        // Only the current holder may release; a reclaimed lock belongs to
        // someone else now.
        if let Some(holder) = holders.get(&token.realm_id) {
            if holder.token_id == token.id {
                holders.remove(&token.realm_id);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_refused_while_held() {
        let lock = MemoryRealmLock::from_millis(30_000);

        let token = lock.acquire("123").await.unwrap().unwrap();
        assert!(lock.acquire("123").await.unwrap().is_none());

        lock.release(token).await.unwrap();
        assert!(lock.acquire("123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn different_realms_do_not_contend() {
        let lock = MemoryRealmLock::from_millis(30_000);

        assert!(lock.acquire("123").await.unwrap().is_some());
        assert!(lock.acquire("456").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lock_is_reclaimed() {
        let lock = MemoryRealmLock::from_millis(1_000);

        let stale = lock.acquire("123").await.unwrap().unwrap();
        tokio::time::advance(Duration::from_millis(1_500)).await;

        let fresh = lock.acquire("123").await.unwrap().unwrap();

        // The stale holder's release must not free the reclaimed lock.
        lock.release(stale).await.unwrap();
        assert!(lock.acquire("123").await.unwrap().is_none());

        lock.release(fresh).await.unwrap();
        assert!(lock.acquire("123").await.unwrap().is_some());
    }
}
