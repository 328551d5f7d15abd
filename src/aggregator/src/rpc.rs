//! JSON-RPC over HTTP client for a remote aggregator.

use crate::client::AggregatorClient;
use crate::errors::AggregatorError;
use crate::types::{
    GetInclusionProofRequest, GetInclusionProofResponse, JsonRpcRequest, JsonRpcResponse,
    SubmitCommitmentRequest, SubmitCommitmentResponse, GET_INCLUSION_PROOF, SUBMIT_COMMITMENT,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use token_core::commitment::RequestId;
use token_core::proofs::InclusionProof;
use tracing::debug;

/// Talks to an aggregator endpoint such as `https://gateway.example/rpc`.
pub struct JsonRpcAggregatorClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcAggregatorClient {
    /// Creates a client whose HTTP calls give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AggregatorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, AggregatorError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method, id, url = %self.url, "sending JSON-RPC request");

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AggregatorError::Unavailable(format!("{} returned {}", method, status)));
        }
        if !status.is_success() {
            return Err(AggregatorError::Http(format!("{} returned {}", method, status)));
        }

        let envelope: JsonRpcResponse<R> = response.json().await?;
        if envelope.id != id {
            return Err(AggregatorError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                envelope.id, id
            )));
        }
        if let Some(error) = envelope.error {
            return Err(AggregatorError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| AggregatorError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl AggregatorClient for JsonRpcAggregatorClient {
    async fn submit_commitment(
        &self,
        request: &SubmitCommitmentRequest,
    ) -> Result<SubmitCommitmentResponse, AggregatorError> {
        self.call(SUBMIT_COMMITMENT, request).await
    }

    async fn get_inclusion_proof(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<InclusionProof>, AggregatorError> {
        let response: GetInclusionProofResponse = self
            .call(
                GET_INCLUSION_PROOF,
                GetInclusionProofRequest {
                    request_id: *request_id,
                },
            )
            .await?;
        Ok(response.inclusion_proof)
    }
}
