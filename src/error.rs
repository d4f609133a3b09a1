use thiserror::Error;

/// Main error type for Shardgraph
///
/// Every failure carries an explicit kind assigned at the point of failure;
/// callers branch on the variant (or the stable `kind()` tag), never on
/// message text.
#[derive(Error, Debug)]
pub enum ShardgraphError {
    /// Malformed input: missing required fields, self-loops, negative
    /// weights, oversized batches, bad continuation tokens
    #[error("Validation error: {0}")]
    Validation(String),

    /// Edge or shard endpoint absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate (source, target, relationship_type) triple for a tenant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bidirectional pair only half-written: the primary edge persisted but
    /// the inverse write failed
    #[error("Partial failure: {message} (primary edge {primary_edge_id})")]
    PartialFailure {
        message: String,
        primary_edge_id: String,
    },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShardgraphError {
    /// Stable kind tag for per-item bulk results and external surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            ShardgraphError::Validation(_) => "validation",
            ShardgraphError::NotFound(_) => "not_found",
            ShardgraphError::Conflict(_) => "conflict",
            ShardgraphError::PartialFailure { .. } => "partial_failure",
            ShardgraphError::Database(_) => "internal",
            ShardgraphError::Io(_) => "internal",
            ShardgraphError::Config(_) => "internal",
        }
    }
}

/// Convenient Result type using ShardgraphError
pub type Result<T> = std::result::Result<T, ShardgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShardgraphError::Conflict("edge already exists".to_string());
        assert!(err.to_string().contains("Conflict"));
        assert!(err.to_string().contains("edge already exists"));
    }

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(ShardgraphError::Validation("x".into()).kind(), "validation");
        assert_eq!(ShardgraphError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ShardgraphError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(
            ShardgraphError::PartialFailure {
                message: "inverse write failed".into(),
                primary_edge_id: "e1".into(),
            }
            .kind(),
            "partial_failure"
        );
        assert_eq!(ShardgraphError::Config("x".into()).kind(), "internal");
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: ShardgraphError = rusqlite_err.into();
        assert!(matches!(err, ShardgraphError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShardgraphError = io_err.into();
        assert!(matches!(err, ShardgraphError::Io(_)));
    }
}
