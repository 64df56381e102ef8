use fanout_types::{ContentItem, PropertyValue};

use crate::error::StoreResult;

/// Path-addressed hierarchical content store.
///
/// All implementations must satisfy these invariants:
/// - Paths are absolute and `/`-separated; the root `/` always exists.
/// - A node can only be written under an existing parent, except through
///   [`ContentStore::create_node`] which creates missing ancestors.
/// - Backend failures are returned as errors, never swallowed.
///
/// The store provides no cross-call atomicity. Callers that need
/// check-then-act semantics on a shared path hold a lock from
/// [`crate::LockManager`] around the sequence.
pub trait ContentStore: Send + Sync {
    /// Read the item at `path`. Returns `Ok(None)` if it does not exist.
    fn get(&self, path: &str) -> StoreResult<Option<ContentItem>>;

    /// Check whether a node exists at `path`.
    fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Create or replace the item at its own path. The parent must exist.
    fn put(&self, item: &ContentItem) -> StoreResult<()>;

    /// Create an empty node at `path` and any missing ancestors.
    ///
    /// Returns `true` if the node at `path` was newly created, `false` if it
    /// already existed. Implementations may create the ancestors one at a
    /// time; callers creating a shared directory lock it first.
    fn create_node(&self, path: &str) -> StoreResult<bool>;

    /// Set a single property on an existing node.
    fn set_property(&self, path: &str, name: &str, value: PropertyValue) -> StoreResult<()>;

    /// Paths of the direct children of `path`, sorted.
    fn children(&self, path: &str) -> StoreResult<Vec<String>>;
}
