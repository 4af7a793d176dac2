//! Cache manager: configuration, backend registry, repository resolution.
//!
//! The manager is the composition root of a cache setup. Backend factories
//! are registered against string kinds at startup, named stores are declared
//! in [`CacheConfig`], and [`CacheManager::store`] turns a name into a ready
//! [`Repository`], memoizing the result so every caller shares one backend
//! instance per name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use larder_store::DynStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::CacheResult;
use crate::error::CacheError;
use crate::repository::Repository;

/// Builds a backend from its store configuration.
///
/// Factories are registered with [`CacheManager::register`] and invoked at
/// most once per store name; the resulting backend is memoized.
pub type StoreFactory = Arc<dyn Fn(&StoreConfig) -> CacheResult<DynStore> + Send + Sync>;

/// Declarative cache configuration: named stores and the default among them.
///
/// # Example
///
/// ```ignore
/// let config: CacheConfig = serde_json::from_value(serde_json::json!({
///     "default": "app",
///     "stores": {
///         "app": { "kind": "memory" },
///         "sessions": { "kind": "redis", "options": { "url": "redis://..." } }
///     }
/// }))?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Name of the store returned by [`CacheManager::default_store`].
    #[serde(rename = "default")]
    pub default_store: String,
    /// Named store declarations.
    pub stores: HashMap<String, StoreConfig>,
}

/// Configuration for a single named store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Registered backend kind this store is built from.
    pub kind: String,
    /// Backend-specific options, passed through to the factory untouched.
    #[serde(default)]
    pub options: Value,
}

/// Resolves named cache stores into shared [`Repository`] handles.
///
/// Construction is explicit: create the manager from a [`CacheConfig`],
/// register one factory per backend kind, then hand the manager to whatever
/// owns it (typically behind an `Arc`). There is no global instance.
pub struct CacheManager {
    config: CacheConfig,
    factories: HashMap<String, StoreFactory>,
    resolved: DashMap<String, Repository>,
}

impl CacheManager {
    /// Creates a manager with no registered backend kinds.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
            resolved: DashMap::new(),
        }
    }

    /// Registers a factory for a backend kind.
    ///
    /// # Errors
    ///
    /// Rejects a blank kind and a kind that is already registered, so a
    /// misconfigured setup fails at startup rather than at first use.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> CacheResult<()>
    where
        F: Fn(&StoreConfig) -> CacheResult<DynStore> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(CacheError::invalid_registration(
                "store kind cannot be blank",
            ));
        }
        if self.factories.contains_key(&kind) {
            return Err(CacheError::invalid_registration(format!(
                "store kind [{kind}] is already registered"
            )));
        }
        debug!(kind = %kind, "cache backend kind registered");
        self.factories.insert(kind, Arc::new(factory));
        Ok(())
    }

    /// The registered backend kinds, in no particular order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Resolves the configured default store.
    pub fn default_store(&self) -> CacheResult<Repository> {
        self.store(&self.config.default_store)
    }

    /// Resolves a named store into a [`Repository`].
    ///
    /// The first resolution builds the backend through its kind's factory;
    /// later calls return clones sharing that same backend.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownStore`] for a name absent from the
    /// configuration and [`CacheError::UnknownKind`] when the declared kind
    /// has no registered factory.
    pub fn store(&self, name: &str) -> CacheResult<Repository> {
        if let Some(existing) = self.resolved.get(name) {
            return Ok(existing.clone());
        }

        let store_config = self
            .config
            .stores
            .get(name)
            .ok_or_else(|| CacheError::unknown_store(name))?;
        let factory = self
            .factories
            .get(&store_config.kind)
            .ok_or_else(|| CacheError::unknown_kind(&store_config.kind))?;

        let store = factory(store_config)?;
        debug!(
            store = %name,
            kind = %store_config.kind,
            backend = store.backend_name(),
            "cache store resolved"
        );

        let repository = Repository::new(store);
        // Two threads can race to build; entry() keeps the first.
        Ok(self
            .resolved
            .entry(name.to_string())
            .or_insert(repository)
            .clone())
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("default", &self.config.default_store)
            .field("stores", &self.config.stores)
            .field("kinds", &self.kinds())
            .finish()
    }
}
