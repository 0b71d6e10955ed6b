//! Crate-wide error and result types.

use std::io;
use thiserror::Error;

/// Result type alias for companion operations.
pub type Result<T> = std::result::Result<T, CompanionError>;

/// Error type for companion operations.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// I/O error from export or network binding.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Sources were already registered once.
    #[error("sources already registered")]
    AlreadyRegistered,
    /// An operation requiring registered sources ran before registration.
    #[error("sources not registered")]
    NotRegistered,
    /// A source index outside the registered range.
    #[error("source index {index} out of range ({sources} sources registered)")]
    SourceOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of registered sources.
        sources: usize,
    },
    /// Invalid argument supplied by a caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A background unit failed or panicked.
    #[error("internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),
}
