use fanout_store::{LockError, StoreError};

/// Errors raised while delivering a single route.
///
/// Transports do not return these to their caller: each is logged and
/// recorded as a failed [`crate::RouteOutcome`] for the route concerned.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// The recipient cannot be turned into a store path segment.
    #[error("invalid recipient {recipient:?}: {reason}")]
    InvalidRecipient { recipient: String, reason: String },

    /// The derived target path has no parent to lock.
    #[error("target {0} has no parent")]
    NoParent(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
