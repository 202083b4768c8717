//! Consistency gate errors

use thiserror::Error;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Gate errors
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("replication position {position} not applied after {waited_ms}ms")]
    AsOfTimeout { position: String, waited_ms: u64 },

    #[error("malformed replication position token: {0}")]
    Malformed(String),

    #[error("wait cancelled")]
    Cancelled,

    #[error("replication probe failed: {0}")]
    Probe(String),
}

impl GateError {
    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            GateError::AsOfTimeout { .. } => "ASOF_TIMEOUT",
            GateError::Malformed(_) => "MALFORMED_POSITION",
            GateError::Cancelled => "WAIT_CANCELLED",
            GateError::Probe(_) => "PROBE_FAILED",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::AsOfTimeout { .. } => 504,
            GateError::Malformed(_) => 400,
            GateError::Cancelled => 503,
            GateError::Probe(_) => 500,
        }
    }
}
