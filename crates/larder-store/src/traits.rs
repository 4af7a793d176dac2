//! The store contract every cache backend implements.
//!
//! This module defines the core trait the coordination layer is built on.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::Capability;
use crate::error::StoreError;

/// The contract every cache backend must implement.
///
/// The required operations are the minimal primitives the coordination layer
/// composes everything else from. The optional operations let a backend
/// expose native atomic or batched paths; backends that cannot provide one
/// keep the default implementation, which reports
/// [`Capability::Unsupported`] so callers pick a fallback instead.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use larder_store::{Store, StoreError};
/// use serde_json::Value;
///
/// async fn greeting(store: &dyn Store) -> Result<Value, StoreError> {
///     store
///         .get("greeting")
///         .await
///         .map(|value| value.unwrap_or(Value::Null))
/// }
/// ```
#[async_trait]
pub trait Store: Send + Sync {
    // ==================== Required operations ====================

    /// Retrieves the value stored at `key`.
    ///
    /// Returns `None` for keys that are absent or whose entry has expired;
    /// a miss is never an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for misses.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` at `key` for `ttl`, replacing any existing entry.
    ///
    /// Callers route a zero `ttl` to [`forever`](Store::forever); a backend
    /// that does receive one must treat it as "no expiry".
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError>;

    /// Adds `delta` to the counter at `key`, returning the new value.
    ///
    /// A missing counter starts at zero. The entry's expiry is left as it
    /// was; a freshly created counter does not expire.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidValue` if the stored value cannot be
    /// interpreted as an integer or the step would overflow it.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Subtracts `delta` from the counter at `key`, returning the new value.
    ///
    /// Equivalent to [`increment`](Store::increment) with a negated delta.
    async fn decrement(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Stores `value` at `key` without expiry.
    async fn forever(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes the entry at `key`; returns `true` if an entry was removed.
    async fn forget(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every entry in the backend, tag versions and locks included.
    async fn flush(&self) -> Result<(), StoreError>;

    // ==================== Optional operations ====================

    /// Atomically stores `value` at `key` only when no live entry exists.
    ///
    /// Returns `Supported(true)` when the entry was created and
    /// `Supported(false)` when a live entry was already present. A backend
    /// overriding this must make set-if-absent atomic with respect to its
    /// own concurrent callers. A zero `ttl` means "no expiry".
    ///
    /// The default reports `Unsupported`; callers then fall back to a
    /// read-then-write sequence and accept that it is not atomic.
    async fn add(
        &self,
        _key: &str,
        _value: Value,
        _ttl: Duration,
    ) -> Result<Capability<bool>, StoreError> {
        Ok(Capability::Unsupported)
    }

    /// Retrieves the values for every key in `keys` in one backend call.
    ///
    /// Every requested key appears in the returned map; misses map to
    /// `None`, never omitted.
    async fn get_many(
        &self,
        _keys: &[String],
    ) -> Result<Capability<HashMap<String, Option<Value>>>, StoreError> {
        Ok(Capability::Unsupported)
    }

    /// Stores every entry in `entries` with the same `ttl` in one backend
    /// call. A zero `ttl` means "no expiry".
    async fn put_many(
        &self,
        _entries: &HashMap<String, Value>,
        _ttl: Duration,
    ) -> Result<Capability<()>, StoreError> {
        Ok(Capability::Unsupported)
    }

    /// Removes every key in `keys` in one backend call.
    async fn forget_many(&self, _keys: &[String]) -> Result<Capability<()>, StoreError> {
        Ok(Capability::Unsupported)
    }

    // ==================== Metadata ====================

    /// The backend's configured key prefix (may be empty).
    ///
    /// The prefix is applied by the backend itself; callers never prepend it.
    fn prefix(&self) -> &str;

    /// The name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that Store is object-safe
    fn _assert_store_object_safe(_: &dyn Store) {}

    /// A backend implementing only the required operations.
    struct BareStore;

    #[async_trait]
    impl Store for BareStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<(), StoreError> {
            Ok(())
        }

        async fn increment(&self, _key: &str, delta: i64) -> Result<i64, StoreError> {
            Ok(delta)
        }

        async fn decrement(&self, _key: &str, delta: i64) -> Result<i64, StoreError> {
            Ok(-delta)
        }

        async fn forever(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Ok(())
        }

        async fn forget(&self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn flush(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn prefix(&self) -> &str {
            ""
        }

        fn backend_name(&self) -> &'static str {
            "bare"
        }
    }

    #[tokio::test]
    async fn test_optional_operations_default_to_unsupported() {
        let store = BareStore;

        let added = store
            .add("k", Value::Null, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!added.is_supported());

        let values = store.get_many(&["k".to_string()]).await.unwrap();
        assert!(!values.is_supported());

        let wrote = store
            .put_many(&HashMap::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!wrote.is_supported());

        let forgot = store.forget_many(&[]).await.unwrap();
        assert!(!forgot.is_supported());
    }
}
