//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use larder_store::{Capability, DynStore, Store, StoreError};
use serde_json::Value;

/// A single cache entry with an optional deadline.
#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            // A deadline beyond the clock's range means no expiry.
            Instant::now().checked_add(ttl)
        };
        Self { value, expires_at }
    }

    fn forever(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Process-local [`Store`] backed by a concurrent hash map.
///
/// Entries carry an optional deadline and are removed lazily when a read
/// finds them expired. All optional contract operations are implemented
/// natively; set-if-absent runs inside a single map guard, so it is atomic
/// within the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CachedEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store wrapped for trait-object consumers.
    #[must_use]
    pub fn shared() -> DynStore {
        Arc::new(Self::new())
    }

    /// Number of physically present entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are physically present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<Value> {
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        // Lazy expiry. The read guard is dropped above; re-check under the
        // write lock so a concurrent overwrite is not removed.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        None
    }

    fn step(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CachedEntry::forever(Value::from(delta)));
                    return Ok(delta);
                }
                let current = occupied.get().value.as_i64().ok_or_else(|| {
                    StoreError::invalid_value(key, "counter value is not an integer")
                })?;
                let next = current.checked_add(delta).ok_or_else(|| {
                    StoreError::invalid_value(key, "counter step overflows")
                })?;
                // Counter steps keep the entry's original expiry.
                occupied.get_mut().value = Value::from(next);
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedEntry::forever(Value::from(delta)));
                Ok(delta)
            }
        }
    }

    fn add_entry(&self, key: &str, value: Value, ttl: Duration) -> bool {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CachedEntry::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedEntry::new(value, ttl));
                true
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.live_value(key))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, ttl));
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.step(key, delta)
    }

    async fn decrement(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let negated = delta
            .checked_neg()
            .ok_or_else(|| StoreError::invalid_value(key, "counter step overflows"))?;
        self.step(key, negated)
    }

    async fn forever(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), CachedEntry::forever(value));
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<Capability<bool>, StoreError> {
        Ok(Capability::Supported(self.add_entry(key, value, ttl)))
    }

    async fn get_many(
        &self,
        keys: &[String],
    ) -> Result<Capability<HashMap<String, Option<Value>>>, StoreError> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            values.insert(key.clone(), self.live_value(key));
        }
        Ok(Capability::Supported(values))
    }

    async fn put_many(
        &self,
        entries: &HashMap<String, Value>,
        ttl: Duration,
    ) -> Result<Capability<()>, StoreError> {
        for (key, value) in entries {
            self.entries
                .insert(key.clone(), CachedEntry::new(value.clone(), ttl));
        }
        Ok(Capability::Supported(()))
    }

    async fn forget_many(&self, keys: &[String]) -> Result<Capability<()>, StoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(Capability::Supported(()))
    }

    fn prefix(&self) -> &str {
        ""
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
