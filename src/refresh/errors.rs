//! Refresh-cycle errors.

use thiserror::Error;

use crate::changes::ChangeError;
use crate::routes::RouteError;

/// Result alias for refresh operations.
pub type RefreshResult<T> = Result<T, RefreshError>;

/// Errors raised by one refresh tick.
///
/// Either side aborts the whole tick: nothing is committed, and the
/// next tick re-reads the same audit window.
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    /// The audit-trail poll failed.
    #[error(transparent)]
    Poll(#[from] ChangeError),

    /// Applying the batch to the route table failed.
    #[error(transparent)]
    Apply(#[from] RouteError),
}

impl RefreshError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RefreshError::Poll(err) => err.code(),
            RefreshError::Apply(err) => err.code(),
        }
    }
}
