//! Wire types for the aggregator JSON-RPC interface.

use serde::{Deserialize, Serialize};
use token_core::commitment::{Authenticator, Commitment, RequestId};
use token_core::hash::DataHash;
use token_core::proofs::InclusionProof;

/// Method name for submitting a commitment.
pub const SUBMIT_COMMITMENT: &str = "submit_commitment";

/// Method name for fetching a proof.
pub const GET_INCLUSION_PROOF: &str = "get_inclusion_proof";

/// Parameters of `submit_commitment`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommitmentRequest {
    pub request_id: RequestId,
    pub transaction_hash: DataHash,
    pub authenticator: Authenticator,
}

impl SubmitCommitmentRequest {
    pub fn from_commitment<T>(commitment: &Commitment<T>) -> Self {
        Self {
            request_id: commitment.request_id,
            transaction_hash: commitment.transaction_hash,
            authenticator: commitment.authenticator.clone(),
        }
    }
}

/// Outcome of a submission as reported by the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStatus {
    /// Accepted, or an identical resubmission
    Success,
    /// The request id is already bound to different data
    RequestIdExists,
    /// The request id does not match the authenticator
    RequestIdMismatch,
    /// The authenticator's signature does not verify
    AuthenticatorVerificationFailed,
    /// Any other rejection
    Failed,
}

/// Result of `submit_commitment`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCommitmentResponse {
    pub status: SubmitStatus,
}

/// Parameters of `get_inclusion_proof`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInclusionProofRequest {
    pub request_id: RequestId,
}

/// Result of `get_inclusion_proof`; `null` when the aggregator has no certified round yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInclusionProofResponse {
    pub inclusion_proof: Option<InclusionProof>,
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    pub fn new(id: u64, method: &str, params: P) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<R>,
    pub error: Option<JsonRpcError>,
}
