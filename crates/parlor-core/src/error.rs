//! Error taxonomy shared by every Parlor crate.

use std::path::Path;

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The four failure kinds a Parlor operation can produce.
///
/// Only [`Error::NotFound`] is meant to be told apart by callers; the other
/// kinds surface as a generic failure carrying their message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad content type, malformed request, unusable identifier.
    #[error("validation failed: {0}")]
    Validation(String),

    /// I/O or (de)serialization failure on the index, a record, or an image.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Provider call failed, or the stream broke mid-way.
    #[error("relay failure: {0}")]
    Relay(String),

    /// Lookup or delete of an unknown id.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Error::Storage(format!("{}: {}", path.display(), err))
    }

    /// Wrap a JSON error with the path of the file being parsed or written.
    pub fn json(path: &Path, err: serde_json::Error) -> Self {
        Error::Storage(format!("{}: {}", path.display(), err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Short, stable name of the error kind (used in logs and HTTP mapping).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Storage(_) => "storage",
            Error::Relay(_) => "relay",
            Error::NotFound(_) => "not_found",
        }
    }
}
