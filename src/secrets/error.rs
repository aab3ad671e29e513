// ABOUTME: Secret store error types.
// ABOUTME: Distinguishes a missing secret from a store that cannot answer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret store unavailable for {reference}: {reason}")]
    Unavailable { reference: String, reason: String },

    #[error("invalid secret reference: {0}")]
    InvalidReference(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;
