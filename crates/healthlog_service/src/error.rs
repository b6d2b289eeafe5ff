//! Custom error types for the service layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("reconcile error: {0}")]
    Reconcile(#[from] healthlog_core::ReconcileError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("source error: {0}")]
    Source(String),
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
