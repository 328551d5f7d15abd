//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur in the core crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed or missing input, caught before anything is signed or sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A specific field failed structural validation.
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending field
        field: String,
        /// Why the field was rejected
        reason: String,
    },

    /// Error when a signature or certificate check fails.
    #[error("Cryptographic error: {0}")]
    Cryptographic(String),

    /// Error when a recomputed digest differs from the stored one.
    #[error("Digest mismatch in {context}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// What was being checked
        context: String,
        /// The digest that was expected (hex)
        expected: String,
        /// The digest that was found (hex)
        actual: String,
    },

    /// Error when a value cannot be canonically encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Error when key material is unusable.
    #[error("Key error: {0}")]
    Key(String),

    /// The request id is already bound to different transaction data.
    #[error("Conflict for request {request_id}: submitted transaction {submitted}, committed transaction {committed}")]
    Conflict {
        /// The request id both commitments share (hex)
        request_id: String,
        /// Transaction hash of the caller's commitment (hex)
        submitted: String,
        /// Transaction hash the network committed to (hex)
        committed: String,
    },

    /// Error when the token history or state does not hash-chain correctly.
    #[error("Chain integrity error at {context}: expected {expected}, got {actual}")]
    ChainIntegrity {
        /// Location in the token history
        context: String,
        /// The hash that was expected (hex)
        expected: String,
        /// The hash that was found (hex)
        actual: String,
    },
}

impl CoreError {
    /// Shorthand for an `InvalidField` error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Core errors are never transient; retrying cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::Validation(format!("malformed JSON: {}", error))
    }
}
