//! Error types for the wallet crate.

use aggregator::errors::AggregatorError;
use thiserror::Error;
use token_core::errors::CoreError;

/// Errors that can occur while minting or transferring tokens.
#[derive(Error, Debug)]
pub enum WalletError {
    /// A local validation, cryptographic or codec check failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The aggregator rejected a call in a way retrying cannot fix.
    #[error("Aggregator error: {0}")]
    Aggregator(AggregatorError),

    /// A transient network failure, surfaced when retrying is not permitted.
    #[error("Network error: {0}")]
    Network(AggregatorError),

    /// The request id is already bound to another transaction.
    #[error("Conflict for request {request_id}: network committed transaction {committed}")]
    Conflict {
        /// The contested request id (hex)
        request_id: String,
        /// Transaction hash the network holds, when known (hex)
        committed: String,
    },

    /// The aggregator refused the commitment outright.
    #[error("Commitment rejected by aggregator: {0}")]
    Rejected(String),

    /// Every attempt failed with a transient error.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted {
        attempts: u32,
        last_error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A transfer package or token could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation was called in the wrong transfer state.
    #[error("Invalid transition: cannot {operation} a transfer in state {status}")]
    InvalidTransition {
        operation: &'static str,
        status: String,
    },
}

impl WalletError {
    /// Whether the failure is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Network(_))
    }
}

impl From<AggregatorError> for WalletError {
    fn from(error: AggregatorError) -> Self {
        match error {
            AggregatorError::Core(e) => WalletError::Core(e),
            e if e.is_retryable() => WalletError::Network(e),
            e => WalletError::Aggregator(e),
        }
    }
}
