//! Error types shared by the chaos control plane services

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types
///
/// Variants map directly onto the error kinds of the control-plane error
/// design: `Rejected`, `InvalidParams`, `NotFound`, `AdapterError`,
/// `Timeout`, `Cancelled`, `RollbackFailed`, plus the ambient `Config`/
/// `Internal` variants needed by any service.
#[derive(Debug, Error)]
pub enum Error {
    /// Policy or concurrency cap denied the request
    #[error("rejected: {0}")]
    Rejected(String),

    /// Parameter bounds violation
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Unknown attack or run id
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Container/db/file/HTTP adapter call failed
    #[error("adapter error ({adapter}): {message}")]
    AdapterError { adapter: String, message: String },

    /// Adapter call exceeded its bound
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Normal cooperative stop; not surfaced as an error to the caller
    #[error("cancelled")]
    Cancelled,

    /// Rollback raised; owned resources may be stranded
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Database errors bubbled up from the target adapter's sqlx calls
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal errors that do not fit any of the above
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterError {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn rollback_failed(msg: impl Into<String>) -> Self {
        Self::RollbackFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-readable kind tag for the `{ kind, message, detail }` error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Rejected(_) => "rejected",
            Error::InvalidParams(_) => "invalid_params",
            Error::NotFound { .. } => "not_found",
            Error::AdapterError { .. } => "adapter_error",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancelled",
            Error::RollbackFailed(_) => "rollback_failed",
            Error::Config(_) => "config_error",
            Error::Database(_) => "adapter_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether an adapter call that raised this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::AdapterError { .. } | Error::Database(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::rejected("x").kind(), "rejected");
        assert_eq!(Error::invalid_params("x").kind(), "invalid_params");
        assert_eq!(Error::not_found("attack", "1").kind(), "not_found");
        assert_eq!(Error::adapter("docker", "x").kind(), "adapter_error");
        assert_eq!(Error::Cancelled.kind(), "cancelled");
        assert_eq!(Error::rollback_failed("x").kind(), "rollback_failed");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Timeout(std::time::Duration::from_secs(1)).is_retryable());
        assert!(Error::adapter("http", "x").is_retryable());
        assert!(!Error::invalid_params("x").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }
}
