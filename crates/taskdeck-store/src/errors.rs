//! Error types for the document store.

use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O error (creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The addressed document does not exist.
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },

    /// A query could not be translated (bad field path or filter value).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Stored data is not a JSON object.
    #[error("invalid document {id}: {message}")]
    InvalidDocument {
        /// Document id.
        id: String,
        /// What was wrong with it.
        message: String,
    },
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
