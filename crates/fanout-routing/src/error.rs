/// Errors raised while building routes.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The item carries no usable destination address. This is a producer
    /// error and is surfaced to the caller.
    #[error("item {path} has no valid destination address")]
    NoRecipients { path: String },

    /// A router could not consult its backing data.
    #[error("router '{router}' lookup failed: {source}")]
    Lookup {
        router: String,
        #[source]
        source: DirectoryError,
    },

    /// A router rejected the table for another reason.
    #[error("router '{router}' failed: {message}")]
    Router { router: String, message: String },
}

impl RoutingError {
    /// Wrap a directory failure raised inside the named router.
    pub fn lookup(router: impl Into<String>, source: DirectoryError) -> Self {
        Self::Lookup {
            router: router.into(),
            source,
        }
    }
}

/// Result alias for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Errors from the user/group directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The directory backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// Group membership forms a cycle or nests too deeply.
    #[error("group {group} nests deeper than {limit} levels")]
    NestingTooDeep { group: String, limit: usize },
}
