use thiserror::Error;

/// Every failure reported by the remote store: lookups, inserts, uploads,
/// updates and catalog fetches.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    #[error("{0}")]
    QueryError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}
