//! Tag version bookkeeping.
//!
//! Every tag name owns a version identifier persisted in the backend at
//! `tag:<name>:key`. The identifiers of a tag set, joined together, form the
//! namespace prefix for keys written through a tagged view; installing a
//! fresh identifier abandons every key written under the old namespace.

use std::fmt;

use futures_util::future::try_join_all;
use larder_store::{DynStore, StoreResult};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// The ordered list of tag names backing a tagged cache view.
///
/// A tag set is a stateless wrapper: version identifiers live in the shared
/// backend, never in the instance, so every view over the same backend and
/// names observes the same namespace at the same point in time.
#[derive(Clone)]
pub struct TagSet {
    store: DynStore,
    names: Vec<String>,
}

impl TagSet {
    /// Creates a tag set over `store` for `names`.
    ///
    /// Order is significant: the namespace joins version identifiers in this
    /// order, so views must use identical name order to share entries.
    pub fn new<I, S>(store: DynStore, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The tag names in namespace order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The backend key holding the version identifier for `name`.
    #[must_use]
    pub fn tag_key(name: &str) -> String {
        format!("tag:{name}:key")
    }

    /// Returns the version identifier for `name`, creating it lazily.
    ///
    /// The first access to an unused tag generates a fresh identifier and
    /// persists it without expiry. Two concurrent first accesses may both
    /// generate one; the later write wins and only that very first access
    /// can diverge.
    pub async fn tag_id(&self, name: &str) -> StoreResult<String> {
        let key = Self::tag_key(name);
        match self.store.get(&key).await? {
            Some(value) => Ok(id_from_value(&value)),
            None => {
                let id = fresh_id();
                self.store.forever(&key, Value::String(id.clone())).await?;
                debug!(tag = %name, id = %id, "created tag version");
                Ok(id)
            }
        }
    }

    /// Unconditionally installs a fresh version identifier for `name` and
    /// returns it.
    pub async fn reset_tag(&self, name: &str) -> StoreResult<String> {
        let id = fresh_id();
        self.store
            .forever(&Self::tag_key(name), Value::String(id.clone()))
            .await?;
        debug!(tag = %name, id = %id, "reset tag version");
        Ok(id)
    }

    /// Installs fresh version identifiers for every tag in the set.
    ///
    /// Entries written under the old namespace are orphaned, not deleted:
    /// they stay in the backend until their TTL lapses or the backend is
    /// flushed, but no tagged view can reach them again.
    pub async fn reset(&self) -> StoreResult<()> {
        try_join_all(self.names.iter().map(|name| self.reset_tag(name))).await?;
        Ok(())
    }

    /// Resolves the namespace prefix for the current tag versions.
    ///
    /// All identifiers are resolved concurrently and joined in tag order:
    /// `<id1>|<id2>|...:`.
    pub async fn namespace(&self) -> StoreResult<String> {
        let ids = try_join_all(self.names.iter().map(|name| self.tag_id(name))).await?;
        Ok(format!("{}:", ids.join("|")))
    }
}

impl fmt::Debug for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagSet")
            .field("names", &self.names)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

// Stored identifiers are strings; anything else is rendered as its JSON text.
fn id_from_value(value: &Value) -> String {
    match value.as_str() {
        Some(id) => id.to_owned(),
        None => value.to_string(),
    }
}
