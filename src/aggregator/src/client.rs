//! The two operations the wallet needs from an aggregator.

use crate::errors::AggregatorError;
use crate::types::{SubmitCommitmentRequest, SubmitCommitmentResponse};
use async_trait::async_trait;
use token_core::commitment::RequestId;
use token_core::proofs::InclusionProof;

/// A commitment aggregator.
///
/// Implementations must be safe to share between tasks; the transfer state
/// machine holds a reference across awaits.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Submits a commitment.
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<SubmitCommitmentResponse, AggregatorError>;

    /// Fetches the current proof for `request_id`, inclusion or exclusion.
    async fn get_inclusion_proof(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<InclusionProof>, AggregatorError>;
}
