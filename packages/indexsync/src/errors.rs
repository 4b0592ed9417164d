//! Error types for indexsync
//!
//! Indexing failures are not retried here. They propagate to the caller of
//! the mutation hook so an entity that could not be indexed is never
//! reported as synced.

use thiserror::Error;

use crate::config::ConfigError;
use crate::shared::models::IndexKey;

/// Main error type for indexsync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Entity type label is not `app_label.model_name`
    #[error("Invalid entity type '{0}': expected 'app_label.model_name'")]
    InvalidEntityType(String),

    /// Two index definitions share `(entity type, name)`
    #[error("Index already registered: {0}")]
    DuplicateIndex(IndexKey),

    /// CLI selectors matched nothing
    #[error("No matching indices found for selectors {0:?}")]
    NoMatchingIndexes(Vec<String>),

    /// `--since` value not understood
    #[error("'{0}' could not be interpreted as a datetime: expected YYYY-MM-DD[-HH:MM] or [#D][#H][#M][#S]")]
    InvalidSince(String),

    /// Exit of a suspension scope that is not active
    #[error("Suspension scope not active: {0}")]
    ScopeNotFound(String),

    /// Read query against the primary store failed
    #[error("Store error: {0}")]
    Store(String),

    /// Search backend rejected an operation
    #[error("Index error on {index}: {message}")]
    Index { index: String, message: String },

    /// Shared cache backend failure
    #[error("Shared cache error: {0}")]
    Cache(#[from] indexsync_storage::StorageError),

    /// Scope list (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Two failures on one suspension exit path: a suspended block and the
    /// exit after it, or a lost scope and its backfill. The first failure
    /// comes first.
    #[error("{original} (suspension exit also failed: {exit})")]
    ExitAfterFailure {
        #[source]
        original: Box<SyncError>,
        exit: Box<SyncError>,
    },
}

impl SyncError {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        SyncError::Store(msg.into())
    }

    /// Create an index error for the given index
    pub fn index(index: &IndexKey, msg: impl Into<String>) -> Self {
        SyncError::Index {
            index: index.to_string(),
            message: msg.into(),
        }
    }
}

/// Result type alias for indexsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::EntityType;
    use std::error::Error;

    #[test]
    fn test_index_error_display() {
        let key = IndexKey::new(EntityType::new("library", "book"), "books");
        let err = SyncError::index(&key, "backend unavailable");
        assert_eq!(
            err.to_string(),
            "Index error on library.book.books: backend unavailable"
        );
    }

    #[test]
    fn test_exit_after_failure_keeps_original_first() {
        let err = SyncError::ExitAfterFailure {
            original: Box::new(SyncError::store("insert failed")),
            exit: Box::new(SyncError::store("backfill failed")),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Store error: insert failed"));
        assert!(msg.contains("backfill failed"));
        assert!(err
            .source()
            .unwrap()
            .to_string()
            .contains("insert failed"));
    }

    #[test]
    fn test_cache_error_conversion() {
        let err: SyncError = indexsync_storage::StorageError::backend("locked").into();
        assert!(matches!(err, SyncError::Cache(_)));
    }
}
