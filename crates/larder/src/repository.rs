//! The caller-facing cache repository.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use larder_store::{Capability, DynStore};
use serde_json::Value;
use tracing::debug;

use crate::CacheResult;
use crate::lock::Lock;
use crate::tag_set::TagSet;
use crate::tagged_store::TaggedStore;

/// The application-facing cache API over exactly one store.
///
/// A repository layers the ergonomic operations (computed-on-miss values,
/// counters, batches, tagging, locks) on top of the minimal
/// [`Store`](larder_store::Store) contract. It holds no cache state of its
/// own - everything lives in the backend - and is cheap to clone; clones
/// share the underlying store.
///
/// Tagged views obtained through [`Repository::tags`] keep a handle to the
/// undecorated backend so [`Repository::lock`] and further `tags` calls
/// always bind to the real store rather than a namespaced view.
#[derive(Clone)]
pub struct Repository {
    /// The store every cache operation goes through (possibly a tagged view).
    store: DynStore,
    /// The undecorated backend, for locks and re-tagging.
    base: DynStore,
}

impl Repository {
    /// Creates a repository over a backend store.
    #[must_use]
    pub fn new(store: DynStore) -> Self {
        Self {
            base: store.clone(),
            store,
        }
    }

    fn tagged(store: DynStore, base: DynStore) -> Self {
        Self { store, base }
    }

    /// The store this repository operates on.
    #[must_use]
    pub fn store(&self) -> &DynStore {
        &self.store
    }

    /// Retrieves the value at `key`.
    ///
    /// A miss (absent or expired entry) is `Ok(None)`; apply defaults with
    /// `unwrap_or` at the call site.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.store.get(key).await?)
    }

    /// Returns `true` when a live entry exists at `key`.
    pub async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.store.get(key).await?.is_some())
    }

    /// Stores `value` at `key` for `ttl`.
    ///
    /// A zero `ttl` means "no expiry" and is routed to the `forever`
    /// primitive rather than written as a zero TTL.
    pub async fn put(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            return self.forever(key, value).await;
        }
        Ok(self.store.put(key, value, ttl).await?)
    }

    /// Stores `value` at `key` without expiry.
    pub async fn forever(&self, key: &str, value: Value) -> CacheResult<()> {
        Ok(self.store.forever(key, value).await?)
    }

    /// Stores `value` at `key` only when no live entry exists; returns
    /// whether the entry was written.
    ///
    /// Prefers the backend's native atomic set-if-absent. When the backend
    /// reports the operation as unsupported, this falls back to a
    /// read-then-write sequence; the fallback is **not** atomic, so two
    /// concurrent callers can both observe absence and both write. Rely on a
    /// backend with a native `add` wherever exclusivity matters.
    pub async fn add(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<bool> {
        match self.store.add(key, value.clone(), ttl).await? {
            Capability::Supported(added) => Ok(added),
            Capability::Unsupported => {
                debug!(key = %key, "backend has no native add, using read-then-write fallback");
                if self.store.get(key).await?.is_some() {
                    return Ok(false);
                }
                self.put(key, value, ttl).await?;
                Ok(true)
            }
        }
    }

    /// Adds `delta` to the counter at `key`, returning the new value.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        Ok(self.store.increment(key, delta).await?)
    }

    /// Subtracts `delta` from the counter at `key`, returning the new value.
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        Ok(self.store.decrement(key, delta).await?)
    }

    /// Returns the value at `key`, computing and storing it on a miss.
    ///
    /// On a hit the producer is never invoked. On a miss the producer runs
    /// exactly once; its value is stored with `ttl` (zero meaning no expiry)
    /// and returned. A failed producer propagates its error and stores
    /// nothing.
    pub async fn remember<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> CacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Value>>,
    {
        if let Some(value) = self.store.get(key).await? {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
        debug!(key = %key, "cache miss, invoking producer");
        let value = producer().await?;
        self.put(key, value.clone(), ttl).await?;
        Ok(value)
    }

    /// Returns the value at `key`, computing and storing it without expiry
    /// on a miss.
    pub async fn remember_forever<F, Fut>(&self, key: &str, producer: F) -> CacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Value>>,
    {
        if let Some(value) = self.store.get(key).await? {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
        debug!(key = %key, "cache miss, invoking producer");
        let value = producer().await?;
        self.forever(key, value.clone()).await?;
        Ok(value)
    }

    /// Removes the entry at `key` and returns the value it held.
    pub async fn pull(&self, key: &str) -> CacheResult<Option<Value>> {
        let value = self.store.get(key).await?;
        self.store.forget(key).await?;
        Ok(value)
    }

    /// Removes the entry at `key`; returns `true` if an entry existed.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        Ok(self.store.forget(key).await?)
    }

    /// Clears the store this repository operates on.
    ///
    /// On a tagged view this resets the tag versions instead of flushing the
    /// shared backend.
    pub async fn flush(&self) -> CacheResult<()> {
        Ok(self.store.flush().await?)
    }

    /// Retrieves the values for every key in `keys`.
    ///
    /// Uses the backend's native batch read when available and sequential
    /// `get` calls otherwise. Every requested key appears in the result;
    /// misses map to `None` rather than being omitted.
    pub async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, Option<Value>>> {
        if let Some(values) = self.store.get_many(keys).await?.into_option() {
            return Ok(values);
        }
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            values.insert(key.clone(), self.store.get(key).await?);
        }
        Ok(values)
    }

    /// Stores every entry in `entries` with the same `ttl`.
    ///
    /// Uses the backend's native batch write when available and per-key
    /// `put` calls otherwise. Either way there is no cross-key atomicity: a
    /// failure partway leaves a mix of old and new values.
    pub async fn put_many(&self, entries: HashMap<String, Value>, ttl: Duration) -> CacheResult<()> {
        if self.store.put_many(&entries, ttl).await?.is_supported() {
            return Ok(());
        }
        for (key, value) in entries {
            self.put(&key, value, ttl).await?;
        }
        Ok(())
    }

    /// Removes every key in `keys`.
    pub async fn forget_many(&self, keys: &[String]) -> CacheResult<()> {
        if self.store.forget_many(keys).await?.is_supported() {
            return Ok(());
        }
        for key in keys {
            self.store.forget(key).await?;
        }
        Ok(())
    }

    /// Returns a repository whose entries are grouped under `names`.
    ///
    /// The tagged view namespaces every key by the current tag versions;
    /// flushing it bumps the versions and orphans the old entries. Views
    /// constructed with the same names in the same order share a namespace.
    /// Tagging is always rooted at the undecorated backend: re-tagging a
    /// tagged repository replaces the tag set rather than stacking
    /// namespaces.
    #[must_use]
    pub fn tags<I, S>(&self, names: I) -> Repository
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tag_set = TagSet::new(self.base.clone(), names);
        let store: DynStore = Arc::new(TaggedStore::new(self.base.clone(), tag_set));
        Repository::tagged(store, self.base.clone())
    }

    /// Returns a lock handle named `name` with a fresh random owner token.
    ///
    /// Locks always bind to the undecorated backend, bypassing tag
    /// namespacing, so tagged and untagged views contend for the same lock.
    #[must_use]
    pub fn lock(&self, name: impl Into<String>, ttl: Duration) -> Lock {
        Lock::new(self.base.clone(), name, ttl)
    }

    /// Re-materializes a lock handle for a known owner token.
    ///
    /// Two handles with the same name and owner are interchangeable: either
    /// can release a lock the other acquired.
    #[must_use]
    pub fn restore_lock(
        &self,
        name: impl Into<String>,
        ttl: Duration,
        owner: impl Into<String>,
    ) -> Lock {
        Lock::with_owner(self.base.clone(), name, ttl, owner)
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("backend", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use larder_memory::MemoryStore;
    use serde_json::json;

    use super::*;
    use crate::CacheError;

    fn repository() -> Repository {
        Repository::new(MemoryStore::shared())
    }

    #[tokio::test]
    async fn test_get_defaults_at_call_site() {
        let cache = repository();

        let color = cache.get("color").await.unwrap().unwrap_or(json!("plum"));
        assert_eq!(color, json!("plum"));

        cache
            .put("color", json!("teal"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.has("color").await.unwrap());
        assert_eq!(cache.get("color").await.unwrap(), Some(json!("teal")));
    }

    #[tokio::test]
    async fn test_zero_ttl_put_stores_without_expiry() {
        let cache = repository();

        cache.put("keep", json!(42), Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("keep").await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_add_respects_existing_live_entry() {
        let cache = repository();

        assert!(cache
            .add("slot", json!("first"), Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!cache
            .add("slot", json!("second"), Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(cache.get("slot").await.unwrap(), Some(json!("first")));
    }

    #[tokio::test]
    async fn test_remember_invokes_producer_once() {
        let cache = repository();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .remember("answer", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(42))
                })
                .await
                .unwrap();
            assert_eq!(value, json!(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remember_forever_stores_without_expiry() {
        let cache = repository();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .remember_forever("motd", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("welcome"))
                })
                .await
                .unwrap();
            assert_eq!(value, json!("welcome"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Stored permanently: still a hit after time passes.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("motd").await.unwrap(), Some(json!("welcome")));
    }

    #[tokio::test]
    async fn test_remember_propagates_producer_error_and_caches_nothing() {
        let cache = repository();

        let outcome = cache
            .remember("broken", Duration::from_secs(60), || async {
                Err(CacheError::from(larder_store::StoreError::internal(
                    "producer blew up",
                )))
            })
            .await;

        assert!(outcome.is_err());
        assert_eq!(cache.get("broken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pull_reads_then_removes() {
        let cache = repository();

        cache.forever("ticket", json!("T-1")).await.unwrap();
        assert_eq!(cache.pull("ticket").await.unwrap(), Some(json!("T-1")));
        assert_eq!(cache.get("ticket").await.unwrap(), None);
        assert_eq!(cache.pull("ticket").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batches_through_native_backend() {
        let cache = repository();

        cache
            .put_many(
                HashMap::from([
                    ("a".to_string(), json!(1)),
                    ("b".to_string(), json!(2)),
                ]),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let values = cache.get_many(&keys).await.unwrap();
        assert_eq!(values["a"], Some(json!(1)));
        assert_eq!(values["b"], Some(json!(2)));
        assert_eq!(values["missing"], None);

        cache.forget_many(&keys).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lock_binds_to_base_store_of_tagged_view() {
        let cache = repository();
        let tagged = cache.tags(["jobs"]);

        let held = cache.lock("worker", Duration::from_secs(10));
        assert!(held.acquire().await.unwrap());

        // Same name through the tagged view contends for the same lock.
        let contender = tagged.lock("worker", Duration::from_secs(10));
        assert!(!contender.acquire().await.unwrap());
        assert!(held.release().await.unwrap());
    }
}
