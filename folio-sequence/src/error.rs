use rusqlite::ErrorCode;
use thiserror::Error;

use crate::DocumentType;

/// Result alias for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for allocation and formatting operations.
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Error type surfaced by counter store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation raised when two first-time creations race for one scope.
    #[error("counter uniqueness conflict: {0}")]
    Conflict(String),
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Conflict(value.to_string()),
            _ => Self::Unavailable(value.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Unavailable(format!("store worker failed: {value}"))
    }
}

/// Error type surfaced to document-creation flows.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence for {document_type} exhausted after {attempts} attempts")]
    Exhausted {
        document_type: DocumentType,
        attempts: u32,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("invalid fiscal year label: {0}")]
    InvalidFiscalYear(String),
}

impl SequenceError {
    /// Whether the failure came from allocation rather than caller input, so the
    /// document creation may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SequenceError::Exhausted { .. } | SequenceError::Store(StoreError::Unavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violations_classify_as_conflicts() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed: counters.document_type".into()),
        );
        assert!(StoreError::from(err).is_conflict());
    }

    #[test]
    fn busy_database_is_unavailable() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Unavailable(_)));
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let exhausted = SequenceError::Exhausted {
            document_type: DocumentType::Invoice,
            attempts: 3,
        };
        assert!(exhausted.is_retryable());
        assert_eq!(
            exhausted.to_string(),
            "sequence for invoice exhausted after 3 attempts"
        );
        assert!(!SequenceError::UnknownDocumentType("memo".into()).is_retryable());
        assert!(!SequenceError::Store(StoreError::Serialization("bad".into())).is_retryable());
    }
}
