//! # larder-memory
//!
//! Process-local in-memory backend for the larder cache.
//!
//! [`MemoryStore`] implements the full [`Store`](larder_store::Store)
//! contract, including the optional native operations (atomic set-if-absent
//! and batches), on top of a concurrent hash map. It is the reference
//! backend and the workhorse for tests.
//!
//! ## Example
//!
//! ```ignore
//! use larder::Repository;
//! use larder_memory::MemoryStore;
//!
//! let cache = Repository::new(MemoryStore::shared());
//! ```

mod store;

pub use store::MemoryStore;
