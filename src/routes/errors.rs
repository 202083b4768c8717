//! Route lifecycle and request rejection errors.

use thiserror::Error;

use crate::metadata::Operation;

/// Result alias for route operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors surfaced by routes and the route manager.
///
/// Request rejections are checked in a fixed order: a disabled route
/// answers `Disabled` before anything else, an operation the descriptor
/// does not carry answers `UnsupportedOperation` before authentication
/// is even considered, and `UnresolvedParameter` rejects before any
/// database call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The route exists but serves nothing right now.
    #[error("Route is disabled")]
    Disabled,

    /// The route needs an authenticated caller.
    #[error("Authentication required")]
    AuthRequired,

    /// The caller is authenticated but not granted this operation.
    #[error("Operation not permitted")]
    Forbidden,

    /// The descriptor does not carry this operation at all.
    #[error("Operation {operation} is not supported by this route")]
    UnsupportedOperation { operation: Operation },

    /// The request names a parameter the object does not declare.
    #[error("Unknown parameter: {name}")]
    UnresolvedParameter { name: String },

    /// No route matches the request path.
    #[error("No route for path: {0}")]
    NotFound(String),

    /// The column cache could not be loaded from the backend.
    #[error("Column cache load failed: {0}")]
    ColumnCache(String),

    /// Internal state was left inconsistent (poisoned lock).
    #[error("Route state error: {0}")]
    Internal(String),
}

impl RouteError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::Disabled => "ROUTE_DISABLED",
            RouteError::AuthRequired => "AUTH_REQUIRED",
            RouteError::Forbidden => "FORBIDDEN",
            RouteError::UnsupportedOperation { .. } => "OPERATION_NOT_SUPPORTED",
            RouteError::UnresolvedParameter { .. } => "UNRESOLVED_PARAMETER",
            RouteError::NotFound(_) => "ROUTE_NOT_FOUND",
            RouteError::ColumnCache(_) => "COLUMN_CACHE_FAILED",
            RouteError::Internal(_) => "ROUTE_STATE_ERROR",
        }
    }

    /// HTTP status code an HTTP layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::Disabled => 503,
            RouteError::AuthRequired => 401,
            RouteError::Forbidden => 403,
            RouteError::UnsupportedOperation { .. } => 405,
            RouteError::UnresolvedParameter { .. } => 400,
            RouteError::NotFound(_) => 404,
            RouteError::ColumnCache(_) => 500,
            RouteError::Internal(_) => 500,
        }
    }
}
