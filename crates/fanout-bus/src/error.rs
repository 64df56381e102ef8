/// Errors produced by the event bus.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been closed and accepts no more events.
    #[error("event bus is closed")]
    Closed,

    /// `try_publish` found the topic's channel full.
    #[error("topic {topic} is full")]
    Full { topic: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the bus crate.
pub type BusResult<T> = Result<T, BusError>;
