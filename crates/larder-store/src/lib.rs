//! # larder-store
//!
//! Store contract for the larder caching layer.
//!
//! This crate defines the trait and types every cache backend must implement.
//! It does not contain any implementations - those are provided by separate
//! crates.
//!
//! ## Overview
//!
//! The main trait is [`Store`], which defines the contract for:
//! - Point reads and writes with TTLs (`get`, `put`, `forever`)
//! - Counters (`increment`, `decrement`)
//! - Removal (`forget`, `flush`)
//! - Optional native operations (`add`, batch reads/writes) signalled
//!   through [`Capability`]
//!
//! A cache miss is a value, never an error: `get` returns `Ok(None)` for
//! absent and expired entries alike.
//!
//! ## Example
//!
//! ```ignore
//! use larder_store::{DynStore, StoreResult};
//! use serde_json::Value;
//!
//! async fn read_greeting(store: &DynStore) -> StoreResult<Option<Value>> {
//!     store.get("greeting").await
//! }
//! ```
//!
//! ## Backends
//!
//! To implement a backend, implement the [`Store`] trait:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use larder_store::{Store, StoreError};
//! use serde_json::Value;
//!
//! struct MyStore {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl Store for MyStore {
//!     async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```
//!
//! Backends only override the optional operations they can execute natively;
//! the defaults report [`Capability::Unsupported`] and callers fall back to
//! compositions of the required primitives.

mod capability;
mod error;
mod traits;

// Re-export everything from submodules
pub use capability::Capability;
pub use error::{ErrorCategory, StoreError};
pub use traits::Store;

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn Store>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use larder_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::capability::Capability;
    pub use crate::error::{ErrorCategory, StoreError};
    pub use crate::traits::Store;
    pub use crate::{DynStore, StoreResult};
}
