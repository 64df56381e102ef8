use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid store path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("property {name} has type {actual}, expected {expected}")]
    PropertyType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}
