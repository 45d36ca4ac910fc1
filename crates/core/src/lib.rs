//! Shared primitives for all Rust crates in Marquee.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use thiserror::Error;

pub use auth::{BearerCredential, VerifiedIdentity};

/// Result type used across Marquee crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Create-if-absent lost against an existing record.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Credential is expired, malformed, or carries a bad signature.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Identity provider could not be reached.
    #[error("identity verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// Caller is authenticated but not allowed to perform the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Required server-side configuration is missing or invalid.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
