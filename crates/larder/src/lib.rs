//! # Larder
//!
//! Storage-agnostic caching for async Rust: one ergonomic repository API
//! over interchangeable backends, with tagged invalidation and named locks.
//!
//! ## Overview
//!
//! - [`Repository`]: the caller-facing API. TTL'd and permanent writes,
//!   counters, compute-on-miss via [`Repository::remember`], batch
//!   operations with transparent fallbacks.
//! - [`TagSet`] and [`TaggedStore`]: group entries under tags and
//!   invalidate a whole group at once without touching the rest of the
//!   backend.
//! - [`Lock`]: named, owner-tokened, TTL-bounded locks built from plain
//!   cache entries.
//! - [`CacheManager`]: the composition root. Registers backend kinds,
//!   reads [`CacheConfig`], resolves named stores into shared
//!   repositories.
//!
//! Backends implement the [`Store`] trait from `larder-store`; the
//! in-memory one lives in `larder-memory`.
//!
//! ## Example
//!
//! ```ignore
//! use larder::{CacheConfig, CacheManager};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let config: CacheConfig = serde_json::from_value(json!({
//!     "default": "app",
//!     "stores": { "app": { "kind": "memory" } }
//! }))?;
//!
//! let mut manager = CacheManager::new(config);
//! manager.register("memory", |_config| Ok(larder_memory::MemoryStore::shared()))?;
//!
//! let cache = manager.default_store()?;
//! cache.put("greeting", json!("hello"), Duration::from_secs(60)).await?;
//!
//! let users = cache.tags(["users"]);
//! users.put("user:1", json!({"name": "Ada"}), Duration::from_secs(60)).await?;
//! users.flush().await?; // invalidates only the "users" group
//! ```

mod error;
mod lock;
mod manager;
mod repository;
mod tag_set;
mod tagged_store;

pub use error::CacheError;
pub use lock::Lock;
pub use manager::{CacheConfig, CacheManager, StoreConfig, StoreFactory};
pub use repository::Repository;
pub use tag_set::TagSet;
pub use tagged_store::TaggedStore;

// The backend contract, re-exported so backend crates and callers can
// depend on `larder` alone.
pub use larder_store::{Capability, DynStore, Store, StoreError, StoreResult};

/// Result type for cache coordination operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenient imports for working with the cache.
pub mod prelude {
    pub use crate::{
        CacheConfig, CacheError, CacheManager, CacheResult, Capability, DynStore, Lock,
        Repository, Store, StoreConfig, StoreError, TagSet, TaggedStore,
    };
}
