//! Error types for index building and spatial queries.

use thiserror::Error;

/// Errors surfaced by the indexing and query engines.
#[derive(Error, Debug)]
pub enum IndexError {
    /// An indexed-only operation was invoked on a table with no index.
    ///
    /// Not recoverable without calling `index()` first.
    #[error("table '{0}' is not indexed")]
    NotIndexed(String),

    /// A stored geometry could not be parsed into an envelope.
    ///
    /// During a build this is logged and the row is skipped; it is only
    /// surfaced when a caller asks for a single geometry directly.
    #[error("geometry parse error: {0}")]
    GeometryParse(String),

    /// The underlying row store or index store failed.
    ///
    /// Fatal to the current operation; nothing from the failing chunk
    /// is committed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A coordinate transform could not be found or applied.
    #[error("projection error: {0}")]
    Projection(String),

    /// A request or configuration value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for featurebox operations.
pub type Result<T> = std::result::Result<T, IndexError>;
