//! Error types for table queries.

use std::time::Duration;

use thiserror::Error;

/// Query-specific errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The field is not in the allow-list for this kind of query.
    #[error("field '{0}' is not allowed here")]
    InvalidFilterField(String),

    /// The name is not a plain column identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Database error from sqlx.
    #[error("query execution failed: {0}")]
    ExecutionFailed(#[from] sqlx::Error),

    /// The query did not finish within the configured timeout.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Returns whether the request itself was at fault, as opposed to the
    /// database.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::InvalidFilterField(_) | Self::InvalidIdentifier(_))
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_errors() {
        assert!(QueryError::InvalidFilterField("X".into()).is_rejected());
        assert!(QueryError::InvalidIdentifier("X;".into()).is_rejected());
        assert!(!QueryError::Timeout(Duration::from_secs(1)).is_rejected());
        assert!(!QueryError::ExecutionFailed(sqlx::Error::RowNotFound).is_rejected());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            QueryError::InvalidFilterField("PASSWORD".into()).to_string(),
            "field 'PASSWORD' is not allowed here"
        );
        assert_eq!(
            QueryError::InvalidIdentifier("a b".into()).to_string(),
            "invalid identifier: a b"
        );
    }
}
