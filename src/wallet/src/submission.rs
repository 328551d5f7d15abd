//! Bounded submit-and-poll loop shared by mints and transfers.

use crate::config::RetryPolicy;
use crate::errors::WalletError;
use aggregator::client::AggregatorClient;
use aggregator::errors::AggregatorError;
use aggregator::types::{SubmitCommitmentRequest, SubmitStatus};
use std::future::Future;
use token_core::certificate::TrustAnchor;
use token_core::commitment::Commitment;
use token_core::errors::CoreError;
use token_core::proofs::{InclusionProof, ProofOutcome};
use tracing::{debug, info, warn};

/// How a submission ended, short of an error.
#[derive(Debug)]
pub enum Submission {
    /// The network holds this commitment; the proof verified.
    Included(InclusionProof),
    /// The network refused the commitment.
    Rejected(SubmitStatus),
}

async fn call<F, R>(retry: &RetryPolicy, method: &str, fut: F) -> Result<R, WalletError>
where
    F: Future<Output = Result<R, AggregatorError>>,
{
    match tokio::time::timeout(retry.call_timeout(), fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AggregatorError::Timeout(method.to_string()).into()),
    }
}

/// Submits `commitment` and polls for its proof until it is included, refused,
/// or the retry budget runs out.
///
/// Only transient network failures and not-yet-included proofs are retried.
/// Dropping the returned future cancels the loop.
pub async fn submit_until_included<C, T>(
    client: &C,
    commitment: &Commitment<T>,
    trust_anchor: &TrustAnchor,
    retry: &RetryPolicy,
) -> Result<Submission, WalletError>
where
    C: AggregatorClient + ?Sized,
{
    let request = SubmitCommitmentRequest::from_commitment(commitment);
    let max_attempts = retry.max_attempts.max(1);
    let mut accepted = false;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        debug!(request_id = %commitment.request_id, attempt, "submission attempt");
        match attempt_once(client, &request, commitment, trust_anchor, retry, &mut accepted).await {
            Ok(Some(submission)) => return Ok(submission),
            Ok(None) => last_error = "commitment not yet included".to_string(),
            Err(e) if e.is_retryable() => {
                warn!(request_id = %commitment.request_id, attempt, error = %e, "transient aggregator failure");
                last_error = e.to_string();
            }
            Err(e) => return Err(e),
        }
        if attempt < max_attempts {
            tokio::time::sleep(retry.backoff(attempt)).await;
        }
    }

    Err(WalletError::RetryBudgetExhausted {
        attempts: max_attempts,
        last_error,
    })
}

async fn attempt_once<C, T>(
    client: &C,
    request: &SubmitCommitmentRequest,
    commitment: &Commitment<T>,
    trust_anchor: &TrustAnchor,
    retry: &RetryPolicy,
    accepted: &mut bool,
) -> Result<Option<Submission>, WalletError>
where
    C: AggregatorClient + ?Sized,
{
    if !*accepted {
        let response = call(retry, "submit_commitment", client.submit_commitment(request)).await?;
        match response.status {
            SubmitStatus::Success => {
                info!(request_id = %commitment.request_id, "commitment accepted");
            }
            // Someone holds this request id; the proof says whether it is us.
            SubmitStatus::RequestIdExists => {
                warn!(request_id = %commitment.request_id, "request id already bound");
            }
            status => return Ok(Some(Submission::Rejected(status))),
        }
        *accepted = true;
    }

    let proof = match call(
        retry,
        "get_inclusion_proof",
        client.get_inclusion_proof(&commitment.request_id),
    )
    .await?
    {
        Some(proof) => proof,
        None => return Ok(None),
    };

    match proof.verify_commitment(trust_anchor, commitment) {
        Ok(ProofOutcome::Included { .. }) => Ok(Some(Submission::Included(proof))),
        Ok(ProofOutcome::Excluded) => Ok(None),
        Ok(ProofOutcome::Invalid(reason)) => Err(CoreError::Cryptographic(format!(
            "aggregator returned an invalid proof for {}: {}",
            commitment.request_id, reason
        ))
        .into()),
        Err(CoreError::Conflict {
            request_id, committed, ..
        }) => Err(WalletError::Conflict {
            request_id,
            committed,
        }),
        Err(e) => Err(e.into()),
    }
}
