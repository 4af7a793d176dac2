//! Named cache locks with owner tokens.
//!
//! A lock is a plain cache entry whose value is the holder's owner token.
//! Acquisition prefers the backend's atomic set-if-absent; release is
//! ownership-checked so a stale handle cannot evict a newer holder.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use larder_store::{Capability, DynStore};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::CacheResult;
use crate::error::CacheError;

/// A named, owned, TTL-bounded mutual-exclusion record in the backend.
///
/// The lock is held exactly when the backend entry at the lock's name exists
/// and stores this handle's owner token. Ownership is backend state, not
/// instance state: two handles with the same name and owner are
/// interchangeable, and a handle whose entry expired and was re-acquired by
/// someone else no longer owns anything.
///
/// Mutual exclusion is only as strong as the backend's `add`: against a
/// backend without a native set-if-absent the fallback acquisition is not
/// atomic across processes.
pub struct Lock {
    store: DynStore,
    name: String,
    ttl: Duration,
    owner: String,
}

impl Lock {
    /// Interval between acquisition attempts inside [`block`](Lock::block).
    pub const DEFAULT_RETRY: Duration = Duration::from_millis(250);

    /// Creates a lock handle with a fresh random owner token.
    #[must_use]
    pub fn new(store: DynStore, name: impl Into<String>, ttl: Duration) -> Self {
        Self::with_owner(store, name, ttl, Uuid::new_v4().to_string())
    }

    /// Creates a lock handle for a known owner token.
    #[must_use]
    pub fn with_owner(
        store: DynStore,
        name: impl Into<String>,
        ttl: Duration,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            store,
            name: name.into(),
            ttl,
            owner: owner.into(),
        }
    }

    /// The lock name (the backend key the owner token is stored under).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This handle's owner token.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Attempts to acquire the lock once; returns `true` on success.
    ///
    /// Prefers the backend's atomic set-if-absent. Against a backend without
    /// one, falls back to a get-then-put sequence that is **not** atomic
    /// across processes: two callers can race past the absence check and
    /// both believe they hold the lock. Use a backend with a native `add`
    /// wherever exact mutual exclusion matters.
    pub async fn acquire(&self) -> CacheResult<bool> {
        let token = Value::String(self.owner.clone());
        let acquired = match self.store.add(&self.name, token.clone(), self.ttl).await? {
            Capability::Supported(added) => added,
            Capability::Unsupported => {
                debug!(lock = %self.name, "backend has no native add, acquisition is not atomic");
                if self.store.get(&self.name).await?.is_some() {
                    false
                } else {
                    self.write_token(token).await?;
                    true
                }
            }
        };
        if acquired {
            debug!(lock = %self.name, owner = %self.owner, "lock acquired");
        }
        Ok(acquired)
    }

    async fn write_token(&self, token: Value) -> CacheResult<()> {
        if self.ttl.is_zero() {
            self.store.forever(&self.name, token).await?;
        } else {
            self.store.put(&self.name, token, self.ttl).await?;
        }
        Ok(())
    }

    /// Returns `true` while the stored owner token matches this handle.
    pub async fn owned(&self) -> CacheResult<bool> {
        let current = self.store.get(&self.name).await?;
        Ok(current.as_ref().and_then(Value::as_str) == Some(self.owner.as_str()))
    }

    /// Releases the lock if this handle still owns it.
    ///
    /// The current owner is re-read and the entry removed only on a match.
    /// An absent or foreign owner leaves the record untouched and returns
    /// `false` - a stale handle must not evict whoever re-acquired the lock
    /// after its TTL lapsed.
    pub async fn release(&self) -> CacheResult<bool> {
        if self.owned().await? {
            self.store.forget(&self.name).await?;
            debug!(lock = %self.name, owner = %self.owner, "lock released");
            Ok(true)
        } else {
            debug!(lock = %self.name, owner = %self.owner, "release refused, lock not owned");
            Ok(false)
        }
    }

    /// Releases the lock regardless of who owns it.
    ///
    /// An administrative escape hatch; [`release`](Lock::release) never uses
    /// this path.
    pub async fn force_release(&self) -> CacheResult<()> {
        self.store.forget(&self.name).await?;
        debug!(lock = %self.name, "lock force-released");
        Ok(())
    }

    /// Runs `f` under the lock if a single acquisition attempt succeeds.
    ///
    /// Returns `Ok(None)` without invoking `f` when the lock is busy. When
    /// `f` runs, the lock is released afterwards on both its success and
    /// error paths; `f`'s error takes precedence over a release error.
    pub async fn get<F, Fut, T>(&self, f: F) -> CacheResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        if !self.acquire().await? {
            return Ok(None);
        }
        let outcome = f().await;
        let released = self.release().await;
        let value = outcome?;
        released?;
        Ok(Some(value))
    }

    /// Waits for the lock, polling every [`DEFAULT_RETRY`](Self::DEFAULT_RETRY).
    ///
    /// Fails with [`CacheError::LockTimeout`] once `timeout` has elapsed
    /// without an acquisition. The wait is cooperative: elapsed time is only
    /// checked between attempts, so the wait can overshoot the timeout by up
    /// to one retry interval.
    pub async fn block(&self, timeout: Duration) -> CacheResult<()> {
        self.block_with_retry(timeout, Self::DEFAULT_RETRY).await
    }

    /// [`block`](Lock::block) with a caller-chosen retry interval.
    pub async fn block_with_retry(&self, timeout: Duration, retry: Duration) -> CacheResult<()> {
        let started = Instant::now();
        loop {
            if self.acquire().await? {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                debug!(lock = %self.name, timeout = ?timeout, "gave up waiting for lock");
                return Err(CacheError::lock_timeout(&self.name, timeout));
            }
            tokio::time::sleep(retry).await;
        }
    }

    /// Waits for the lock, then runs `f` and releases afterwards.
    ///
    /// Acquisition follows [`block`](Lock::block); release behavior matches
    /// [`get`](Lock::get).
    pub async fn block_with<F, Fut, T>(&self, timeout: Duration, f: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        self.block(timeout).await?;
        let outcome = f().await;
        let released = self.release().await;
        let value = outcome?;
        released?;
        Ok(value)
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("ttl", &self.ttl)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}
