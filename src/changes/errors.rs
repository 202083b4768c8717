//! Change-diff errors.

use thiserror::Error;

use crate::metadata::StoreError;

/// Result alias for poll operations.
pub type ChangeResult<T> = Result<T, ChangeError>;

/// Errors raised while diffing the audit trail.
#[derive(Error, Debug, Clone)]
pub enum ChangeError {
    /// The diff could not be read as one consistent scope.
    #[error("Change diff failed: {0}")]
    DiffTransaction(String),

    /// The metadata backend could not be reached at all.
    #[error("Metadata backend unavailable: {0}")]
    Unavailable(String),
}

impl ChangeError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ChangeError::DiffTransaction(_) => "CHANGE_DIFF_FAILED",
            ChangeError::Unavailable(_) => "METADATA_UNAVAILABLE",
        }
    }
}

impl From<StoreError> for ChangeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Query(msg) | StoreError::Transaction(msg) => {
                ChangeError::DiffTransaction(msg)
            }
            StoreError::Unavailable(msg) => ChangeError::Unavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ChangeError::DiffTransaction("rollback".into()).code(),
            "CHANGE_DIFF_FAILED"
        );
        assert_eq!(
            ChangeError::Unavailable("down".into()).code(),
            "METADATA_UNAVAILABLE"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let query: ChangeError = StoreError::Query("bad sql".into()).into();
        assert!(matches!(query, ChangeError::DiffTransaction(_)));

        let txn: ChangeError = StoreError::Transaction("aborted".into()).into();
        assert!(matches!(txn, ChangeError::DiffTransaction(_)));

        let gone: ChangeError = StoreError::Unavailable("refused".into()).into();
        assert!(matches!(gone, ChangeError::Unavailable(_)));
    }
}
