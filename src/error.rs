//! Centralized error types for mailquery.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailquery library.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The request is malformed: missing query, bad sort/type/fetch value,
    /// unparseable query syntax.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A mailbox entity referenced by the query does not exist.
    #[error("No such {kind}: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The executor produced a hit this layer cannot render.
    #[error("Unknown hit type: {0}")]
    UnknownHitType(String),

    /// A best-effort side effect (mark-as-read) failed.
    #[error("Side effect failed: {0}")]
    SideEffect(String),

    /// An item could not be encoded into the response.
    #[error("Encoding error for item {item_id}: {reason}")]
    Encoding { item_id: u32, reason: String },

    /// The caller stopped the search between hits.
    #[error("Search cancelled")]
    Cancelled,

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A mailbox or proxied payload could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, SearchError>`.
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for an `InvalidRequest` with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a `NotFound` variant for the given entity kind.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}
