use std::time::Duration;

use fanout_types::TypeError;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested node was not found.
    #[error("node not found: {0}")]
    NotFound(String),

    /// A node already exists where a new one was to be created.
    #[error("node already exists: {0}")]
    AlreadyExists(String),

    /// Path or property type violation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Backend failure (I/O, connectivity, injected fault).
    #[error("store unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// Invalid sharding or store configuration.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the named lock manager.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LockError {
    /// The lock could not be acquired before the deadline.
    #[error("timed out after {waited:?} waiting for lock {name}")]
    Timeout { name: String, waited: Duration },

    #[error("lock table poisoned")]
    Poisoned,
}
