use fanout_bus::BusError;
use fanout_routing::RoutingError;
use fanout_store::{LockError, StoreError};

/// Errors that end the delivery of one event.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The item has no actor. A producer bug; never retried.
    #[error("item {path} has no actor")]
    MissingActor { path: String },

    #[error("event {event} does not name an item")]
    MissingItemPath { event: String },

    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Some routes could not be delivered; see the outcome's reports.
    #[error("{failed} of {total} routes failed")]
    RoutesFailed { failed: usize, total: usize },

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// Returns `true` for failures caused by the producer's input rather
    /// than by the environment.
    pub fn is_producer_error(&self) -> bool {
        matches!(
            self,
            Self::MissingActor { .. }
                | Self::MissingItemPath { .. }
                | Self::Routing(RoutingError::NoRecipients { .. })
        )
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
