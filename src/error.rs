//! Error types shared across the crate.

use thiserror::Error;

/// Errors surfaced by database construction, ingestion, derivation,
/// merging, and persistence.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// An item could not be normalized: empty, outside the configured
    /// alphabet, or containing the reserved item separator.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// A transaction exceeded the maximum itemset length while strict
    /// transaction length checking is enabled.
    #[error("transaction has {length} items, exceeding the maximum itemset length of {max_length}")]
    MaxLengthExceeded { length: usize, max_length: usize },

    /// The predictor was given an item that has never been ingested.
    #[error("unknown antecedent: '{0}'")]
    UnknownAntecedent(String),

    /// Two databases with differing configurations cannot be merged.
    #[error("cannot merge databases: {0}")]
    IncompatibleMerge(String),

    /// A persisted blob uses an unknown schema version or is corrupt.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Invalid construction parameters or query thresholds.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = DatabaseError::InvalidItem("abc".to_string());
        assert!(err.to_string().contains("abc"));

        let err = DatabaseError::MaxLengthExceeded {
            length: 9,
            max_length: 4,
        };
        assert!(err.to_string().contains('9'));
        assert!(err.to_string().contains('4'));

        let err = DatabaseError::UnknownAntecedent("soda".to_string());
        assert!(err.to_string().contains("soda"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DatabaseError = io.into();
        assert!(matches!(err, DatabaseError::Io(_)));
    }
}
