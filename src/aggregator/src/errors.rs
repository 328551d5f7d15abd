/// Error types for the aggregator crate.
use std::error::Error as StdError;
use std::fmt;
use token_core::errors::CoreError;

/// Errors that can occur talking to an aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    /// Error when the endpoint cannot be reached or the transport fails.
    Http(String),

    /// Error when a call does not finish in time.
    Timeout(String),

    /// Error when the service is up but temporarily refusing work.
    Unavailable(String),

    /// Error returned by the service in the JSON-RPC error object.
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Service-provided message
        message: String,
    },

    /// Error when a request or response cannot be (de)serialized.
    Serialization(String),

    /// Error when the response is well-formed JSON but not a valid answer.
    InvalidResponse(String),

    /// Error from a core operation performed on the service side.
    Core(CoreError),
}

impl AggregatorError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AggregatorError::Http(_) | AggregatorError::Timeout(_) | AggregatorError::Unavailable(_)
        )
    }
}

impl fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorError::Http(msg) => write!(f, "HTTP error: {}", msg),
            AggregatorError::Timeout(msg) => write!(f, "Timeout waiting for {}", msg),
            AggregatorError::Unavailable(msg) => write!(f, "Aggregator unavailable: {}", msg),
            AggregatorError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            AggregatorError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AggregatorError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            AggregatorError::Core(e) => write!(f, "Core error: {}", e),
        }
    }
}

impl StdError for AggregatorError {}

impl From<CoreError> for AggregatorError {
    fn from(error: CoreError) -> Self {
        AggregatorError::Core(error)
    }
}

impl From<serde_json::Error> for AggregatorError {
    fn from(error: serde_json::Error) -> Self {
        AggregatorError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for AggregatorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AggregatorError::Timeout(error.to_string())
        } else if error.is_decode() {
            AggregatorError::InvalidResponse(error.to_string())
        } else {
            AggregatorError::Http(error.to_string())
        }
    }
}
