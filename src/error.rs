use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::container::ContainerError;
use crate::database::DatabaseError;

/// Unified error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] crate::schema::Error),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is an optimistic lock conflict, which a caller can
    /// resolve by refreshing and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::Container(ContainerError::OptimisticLockConflict { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlLiteral;

    #[test]
    fn test_conversions() {
        let err: Error = ContainerError::OptimisticLockConflict {
            table: "Users".to_string(),
            key: SqlLiteral::text("andkon"),
            expected: SqlLiteral::integer(2),
        }
        .into();
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "container error: row 'andkon' in Users was changed by another session (expected version 2)"
        );

        let err: Error = DatabaseError::Query("boom".to_string()).into();
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "database error: query error: boom");
    }
}
