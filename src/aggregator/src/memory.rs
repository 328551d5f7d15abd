//! In-process aggregator.
//!
//! Keeps commitments in a [`RadixTree`], certifies every root with a local
//! validator set and answers exactly like a remote aggregator would. Failure
//! and latency injection make it usable for exercising retry paths.

use crate::client::AggregatorClient;
use crate::errors::AggregatorError;
use crate::smt::RadixTree;
use crate::types::{SubmitCommitmentRequest, SubmitCommitmentResponse, SubmitStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use token_core::certificate::{TrustAnchor, UnicityCertificate};
use token_core::commitment::{Authenticator, RequestId};
use token_core::errors::CoreError;
use token_core::hash::DataHash;
use token_core::proofs::{leaf_value, InclusionProof};
use token_core::signing::{Signer, SigningService};
use tracing::{debug, info, warn};

const DEFAULT_VALIDATORS: usize = 3;
const DEFAULT_QUORUM: usize = 2;

struct Record {
    transaction_hash: DataHash,
    authenticator: Authenticator,
}

#[derive(Default)]
struct State {
    tree: RadixTree,
    records: HashMap<RequestId, Record>,
    round: u64,
}

pub struct InMemoryAggregator {
    state: Mutex<State>,
    validators: Vec<SigningService>,
    quorum: usize,
    fail_next: AtomicUsize,
    latency_ms: AtomicU64,
}

impl InMemoryAggregator {
    /// Three validators, any two of which certify a root.
    pub fn new() -> Result<Self, AggregatorError> {
        let validators = (0..DEFAULT_VALIDATORS)
            .map(|i| SigningService::from_secret(format!("validator-{}", i).as_bytes(), None))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_validators(validators, DEFAULT_QUORUM)
    }

    pub fn with_validators(validators: Vec<SigningService>, quorum: usize) -> Result<Self, AggregatorError> {
        if quorum == 0 || quorum > validators.len() {
            return Err(CoreError::Validation(format!(
                "quorum {} is not achievable with {} validators",
                quorum,
                validators.len()
            ))
            .into());
        }
        Ok(Self {
            state: Mutex::new(State::default()),
            validators,
            quorum,
            fail_next: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
        })
    }

    /// The anchor a wallet needs to trust this aggregator's certificates.
    pub fn trust_anchor(&self) -> Result<TrustAnchor, AggregatorError> {
        let keys = self
            .validators
            .iter()
            .map(|v| v.public_key())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TrustAnchor::new(keys, self.quorum)?)
    }

    /// Makes the next `count` calls fail with a retryable error.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of distinct request ids committed so far.
    pub fn commitment_count(&self) -> Result<usize, AggregatorError> {
        Ok(self.lock()?.records.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AggregatorError> {
        self.state
            .lock()
            .map_err(|_| AggregatorError::Unavailable("aggregator state lock poisoned".to_string()))
    }

    async fn simulate_network(&self, method: &str) -> Result<(), AggregatorError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!(method, "injected aggregator failure");
            return Err(AggregatorError::Unavailable(format!("{} failed (injected)", method)));
        }
        Ok(())
    }

    fn submit(&self, request: &SubmitCommitmentRequest) -> Result<SubmitStatus, AggregatorError> {
        if request.authenticator.request_id() != request.request_id {
            return Ok(SubmitStatus::RequestIdMismatch);
        }
        if request.authenticator.verify(&request.transaction_hash).is_err() {
            return Ok(SubmitStatus::AuthenticatorVerificationFailed);
        }

        let mut state = self.lock()?;
        if let Some(existing) = state.records.get(&request.request_id) {
            return Ok(
                if existing.transaction_hash == request.transaction_hash
                    && existing.authenticator == request.authenticator
                {
                    debug!(request_id = %request.request_id, "identical resubmission");
                    SubmitStatus::Success
                } else {
                    warn!(request_id = %request.request_id, "request id already bound to other data");
                    SubmitStatus::RequestIdExists
                },
            );
        }

        let value = leaf_value(&request.authenticator, &request.transaction_hash)?;
        state.tree.insert(&request.request_id, value)?;
        state.records.insert(
            request.request_id,
            Record {
                transaction_hash: request.transaction_hash,
                authenticator: request.authenticator.clone(),
            },
        );
        state.round += 1;
        info!(
            request_id = %request.request_id,
            round = state.round,
            "commitment accepted"
        );
        Ok(SubmitStatus::Success)
    }

    fn proof(&self, request_id: &RequestId) -> Result<InclusionProof, AggregatorError> {
        let state = self.lock()?;
        let merkle_tree_path = state.tree.path(request_id);
        let unicity_certificate =
            UnicityCertificate::sign(merkle_tree_path.root, state.round, &self.validators)?;
        let record = state.records.get(request_id);
        Ok(InclusionProof {
            merkle_tree_path,
            authenticator: record.map(|r| r.authenticator.clone()),
            transaction_hash: record.map(|r| r.transaction_hash),
            unicity_certificate,
        })
    }
}

#[async_trait]
impl AggregatorClient for InMemoryAggregator {
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<SubmitCommitmentResponse, AggregatorError> {
        self.simulate_network("submit_commitment").await?;
        let status = self.submit(request)?;
        Ok(SubmitCommitmentResponse { status })
    }

    async fn get_inclusion_proof(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<InclusionProof>, AggregatorError> {
        self.simulate_network("get_inclusion_proof").await?;
        self.proof(request_id).map(Some)
    }
}
