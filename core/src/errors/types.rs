//! Error types for principal lookup, token handling, key management and session lineages

use thiserror::Error;

/// Principal resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Principal lookup failed")]
    LookupFailed,
}

/// Token errors as seen by callers of the lifecycle manager
///
/// None of these carry sequence numbers or key details; they are safe to
/// surface to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token expired")]
    Expired,

    #[error("Wrong token type")]
    WrongType,

    #[error("Refresh token reuse detected")]
    ReuseDetected,

    #[error("Token revoked")]
    Revoked,

    #[error("Token generation failed")]
    GenerationFailed,

    #[error("Token service temporarily unavailable")]
    Unavailable,
}

/// Signing key ring errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("Key not found: {key_id}")]
    NotFound { key_id: String },

    #[error("Unsupported signing algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

/// Session store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Sequence mismatch")]
    SequenceMismatch,

    #[error("Token family revoked")]
    FamilyRevoked,

    #[error("Token family not found")]
    NotFound,

    /// Transient contention on the store; safe to retry
    #[error("Session store contention")]
    Contention,

    #[error("Session store failure: {message}")]
    Storage { message: String },
}

impl SessionError {
    /// Whether the operation may succeed if simply attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Contention)
    }
}
