//! TaggedStore - a store decorator that namespaces keys by tag versions.
//!
//! This wrapper delegates all operations to an inner store with every key
//! rewritten under the owning tag set's current namespace. Flushing it
//! resets the tag versions instead of clearing the shared backend.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use larder_store::{Capability, DynStore, Store, StoreError, StoreResult};
use serde_json::Value;
use tracing::debug;

use crate::tag_set::TagSet;

/// A [`Store`] that scopes every key to the current tag namespace.
///
/// The namespace is resolved from the backend on **every** operation - never
/// cached across calls - so a concurrent tag reset is observed by the very
/// next operation on any view. Batch operations resolve the namespace
/// exactly once per call and apply that single snapshot to every key in the
/// batch.
///
/// `flush` resets the tag versions rather than flushing the backend: the old
/// entries are orphaned in place and the rest of the cache is untouched.
pub struct TaggedStore {
    /// The store keys are delegated to after rewriting.
    inner: DynStore,
    /// The tag versions that make up the namespace.
    tags: TagSet,
}

impl TaggedStore {
    /// Creates a tagged view over `inner` for the given tag set.
    pub fn new(inner: DynStore, tags: TagSet) -> Self {
        Self { inner, tags }
    }

    /// The tag set backing this view.
    pub fn tag_set(&self) -> &TagSet {
        &self.tags
    }

    async fn scoped_key(&self, key: &str) -> StoreResult<String> {
        Ok(format!("{}{key}", self.tags.namespace().await?))
    }
}

#[async_trait]
impl Store for TaggedStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.get(&key).await
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.put(&key, value, ttl).await
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.increment(&key, delta).await
    }

    async fn decrement(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.decrement(&key, delta).await
    }

    async fn forever(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.forever(&key, value).await
    }

    async fn forget(&self, key: &str) -> Result<bool, StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.forget(&key).await
    }

    /// Invalidates this tag combination by bumping every tag version.
    ///
    /// The shared backend is **not** flushed; entries of other tag
    /// combinations and untagged entries are untouched.
    async fn flush(&self) -> Result<(), StoreError> {
        debug!(tags = ?self.tags.names(), "flushing tagged view");
        self.tags.reset().await
    }

    async fn add(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<Capability<bool>, StoreError> {
        let key = self.scoped_key(key).await?;
        self.inner.add(&key, value, ttl).await
    }

    async fn get_many(
        &self,
        keys: &[String],
    ) -> Result<Capability<HashMap<String, Option<Value>>>, StoreError> {
        // One namespace snapshot for the whole batch.
        let namespace = self.tags.namespace().await?;
        let scoped: Vec<String> = keys.iter().map(|key| format!("{namespace}{key}")).collect();

        match self.inner.get_many(&scoped).await? {
            Capability::Supported(mut values) => {
                let mut unscoped = HashMap::with_capacity(keys.len());
                for (key, scoped_key) in keys.iter().zip(&scoped) {
                    unscoped.insert(key.clone(), values.remove(scoped_key).flatten());
                }
                Ok(Capability::Supported(unscoped))
            }
            Capability::Unsupported => {
                // Per-key fallback still uses the single snapshot above, so
                // the once-per-call rule holds for every backend.
                let mut unscoped = HashMap::with_capacity(keys.len());
                for (key, scoped_key) in keys.iter().zip(&scoped) {
                    unscoped.insert(key.clone(), self.inner.get(scoped_key).await?);
                }
                Ok(Capability::Supported(unscoped))
            }
        }
    }

    async fn put_many(
        &self,
        entries: &HashMap<String, Value>,
        ttl: Duration,
    ) -> Result<Capability<()>, StoreError> {
        let namespace = self.tags.namespace().await?;
        let scoped: HashMap<String, Value> = entries
            .iter()
            .map(|(key, value)| (format!("{namespace}{key}"), value.clone()))
            .collect();

        match self.inner.put_many(&scoped, ttl).await? {
            Capability::Supported(()) => Ok(Capability::Supported(())),
            Capability::Unsupported => {
                for (key, value) in scoped {
                    if ttl.is_zero() {
                        self.inner.forever(&key, value).await?;
                    } else {
                        self.inner.put(&key, value, ttl).await?;
                    }
                }
                Ok(Capability::Supported(()))
            }
        }
    }

    async fn forget_many(&self, keys: &[String]) -> Result<Capability<()>, StoreError> {
        let namespace = self.tags.namespace().await?;
        let scoped: Vec<String> = keys.iter().map(|key| format!("{namespace}{key}")).collect();

        match self.inner.forget_many(&scoped).await? {
            Capability::Supported(()) => Ok(Capability::Supported(())),
            Capability::Unsupported => {
                for key in &scoped {
                    self.inner.forget(key).await?;
                }
                Ok(Capability::Supported(()))
            }
        }
    }

    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl fmt::Debug for TaggedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedStore")
            .field("tags", &self.tags.names())
            .field("backend", &self.inner.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use larder_memory::MemoryStore;
    use serde_json::json;

    use super::*;

    fn tagged(store: &DynStore, names: &[&str]) -> TaggedStore {
        TaggedStore::new(
            store.clone(),
            TagSet::new(store.clone(), names.iter().copied()),
        )
    }

    #[tokio::test]
    async fn test_keys_are_scoped_to_the_namespace() {
        let store = MemoryStore::shared();
        let view = tagged(&store, &["users"]);

        view.put("profile", json!("ada"), Duration::from_secs(60))
            .await
            .unwrap();

        // The bare key does not exist on the backend; the scoped one does.
        assert_eq!(store.get("profile").await.unwrap(), None);
        assert_eq!(view.get("profile").await.unwrap(), Some(json!("ada")));

        let namespace = view.tag_set().namespace().await.unwrap();
        let scoped = format!("{namespace}profile");
        assert_eq!(store.get(&scoped).await.unwrap(), Some(json!("ada")));
    }

    #[tokio::test]
    async fn test_same_names_share_entries_across_views() {
        let store = MemoryStore::shared();
        let writer = tagged(&store, &["posts", "feeds"]);
        let reader = tagged(&store, &["posts", "feeds"]);

        writer.forever("front-page", json!([1, 2, 3])).await.unwrap();
        assert_eq!(
            reader.get("front-page").await.unwrap(),
            Some(json!([1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn test_flush_resets_versions_but_keeps_backend() {
        let store = MemoryStore::shared();
        let view = tagged(&store, &["sessions"]);

        view.forever("token", json!("abc")).await.unwrap();
        store.forever("untagged", json!(true)).await.unwrap();

        view.flush().await.unwrap();

        // The tagged entry is unreachable, the untagged one untouched.
        assert_eq!(view.get("token").await.unwrap(), None);
        assert_eq!(store.get("untagged").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_concurrent_reset_is_observed_next_call() {
        let store = MemoryStore::shared();
        let view = tagged(&store, &["inventory"]);
        let other = tagged(&store, &["inventory"]);

        view.forever("count", json!(9)).await.unwrap();
        other.tag_set().reset().await.unwrap();

        // Nothing is cached across calls: the very next read resolves the
        // fresh namespace and misses.
        assert_eq!(view.get("count").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batches_use_one_namespace_and_unscoped_result_keys() {
        let store = MemoryStore::shared();
        let view = tagged(&store, &["prices"]);

        view.put_many(
            &HashMap::from([
                ("apple".to_string(), json!(3)),
                ("pear".to_string(), json!(5)),
            ]),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let keys = vec![
            "apple".to_string(),
            "pear".to_string(),
            "quince".to_string(),
        ];
        let values = view.get_many(&keys).await.unwrap().into_option().unwrap();
        assert_eq!(values["apple"], Some(json!(3)));
        assert_eq!(values["pear"], Some(json!(5)));
        assert_eq!(values["quince"], None);

        view.forget_many(&keys).await.unwrap();
        assert_eq!(view.get("apple").await.unwrap(), None);
    }
}
