//! Privilege resolution errors.

use thiserror::Error;

/// Result alias for privilege operations.
pub type PrivilegeResult<T> = Result<T, PrivilegeError>;

/// Errors raised while resolving a user's privileges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeError {
    /// The privilege backend could not be queried.
    #[error("Privilege source error: {0}")]
    Source(String),

    /// Internal state was left inconsistent (poisoned lock).
    #[error("Privilege state error: {0}")]
    State(String),
}

impl PrivilegeError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            PrivilegeError::Source(_) => "PRIVILEGE_SOURCE_FAILED",
            PrivilegeError::State(_) => "PRIVILEGE_STATE_ERROR",
        }
    }
}
