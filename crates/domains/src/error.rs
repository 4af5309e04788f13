//! # DomainError
//!
//! Centralized error handling for the community board.
//! Every port returns this type; adapters fold their infrastructure
//! errors into `Internal` so nothing vendor-specific leaks upwards.

use std::fmt::Display;
use thiserror::Error;

/// Credential failures reported by the `AuthProvider`.
///
/// Each variant has a stable code so clients can branch on it without
/// parsing the human-readable message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("invalid email format")]
    InvalidEmail,
    #[error("no account registered for this email")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("too many failed sign-in attempts")]
    TooManyRequests,
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("password is too weak")]
    WeakPassword,
    #[error("session token is invalid or expired")]
    InvalidToken,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::InvalidEmail => "auth/invalid-email",
            AuthFailure::UserNotFound => "auth/user-not-found",
            AuthFailure::WrongPassword => "auth/wrong-password",
            AuthFailure::TooManyRequests => "auth/too-many-requests",
            AuthFailure::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthFailure::WeakPassword => "auth/weak-password",
            AuthFailure::InvalidToken => "auth/invalid-token",
        }
    }
}

/// The primary error type for all domain and port operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Post, Comment, UserProfile)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Validation failure (e.g., blank title, malformed id)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No usable identity was presented
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Identity is known but may not touch this resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// State conflict (e.g., deleting an already deleted comment)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credential provider rejected the request
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    /// Infrastructure failure (e.g., DB down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        DomainError::NotFound(entity, id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::ValidationError(msg.into())
    }

    /// Wraps any infrastructure error. Adapters use this in `map_err`
    /// since they cannot implement `From` for foreign error types.
    pub fn internal(err: impl Display) -> Self {
        DomainError::Internal(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(..))
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
