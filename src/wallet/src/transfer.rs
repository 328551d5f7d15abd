//! Offline token transfer.
//!
//! The sender `prepare`s and `package`s a transfer without network access. The
//! recipient `receive`s the bytes and `finalize`s them into a locally valid,
//! still unconfirmed token. Only `submit` talks to the aggregator.
//!
//! ```text
//! Prepared -> Packaged -> Exchanged -> Finalized -> Submitted -> Confirmed
//!                                                             \-> Failed
//! ```

use crate::config::RetryPolicy;
use crate::errors::WalletError;
use crate::identity::ReceiverIdentity;
use crate::submission::{submit_until_included, Submission};
use aggregator::client::AggregatorClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use token_core::certificate::TrustAnchor;
use token_core::commitment::{build_transfer_commitment, TransferCommitment, TransferIntent};
use token_core::errors::CoreError;
use token_core::predicate::{Address, TokenState};
use token_core::signing::{MintAuthority, Signer};
use token_core::token::{Token, Transaction};
use token_core::types::Salt;
use tracing::{debug, info, warn};

/// Envelope format version written by [`package`].
pub const PACKAGE_VERSION: &str = "1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Prepared,
    Packaged,
    Exchanged,
    Finalized,
    Submitted,
    Confirmed,
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStatus::Prepared => "prepared",
            TransferStatus::Packaged => "packaged",
            TransferStatus::Exchanged => "exchanged",
            TransferStatus::Finalized => "finalized",
            TransferStatus::Submitted => "submitted",
            TransferStatus::Confirmed => "confirmed",
            TransferStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn expect_status(operation: &'static str, actual: TransferStatus, allowed: &[TransferStatus]) -> Result<(), WalletError> {
    if allowed.contains(&actual) {
        Ok(())
    } else {
        Err(WalletError::InvalidTransition {
            operation,
            status: actual.to_string(),
        })
    }
}

/// What travels from sender to recipient: the token with its full history and
/// the signed commitment spending its current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPackage {
    pub version: String,
    pub status: TransferStatus,
    pub token: Token,
    pub commitment: TransferCommitment,
}

/// A transfer the recipient has accepted locally but the network has not yet confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    status: TransferStatus,
    token: Token,
    commitment: TransferCommitment,
}

impl PendingTransfer {
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// The token with the transfer appended; its last transaction carries a
    /// proof once confirmed.
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn commitment(&self) -> &TransferCommitment {
        &self.commitment
    }
}

/// Final result of [`submit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The network included the transfer.
    Confirmed(Token),
    /// The network refused the transfer.
    Failed(String),
}

/// Builds a transfer of `token` to `recipient` with a fresh salt. Offline.
pub fn prepare<S: Signer + ?Sized>(
    token: &Token,
    recipient: Address,
    signer: &S,
) -> Result<TransferPackage, WalletError> {
    prepare_with(
        token,
        TransferIntent {
            recipient,
            salt: Salt::random(),
            recipient_data_hash: None,
            message: None,
        },
        signer,
    )
}

/// Builds a transfer of `token` as described by `intent`. Offline.
pub fn prepare_with<S: Signer + ?Sized>(
    token: &Token,
    intent: TransferIntent,
    signer: &S,
) -> Result<TransferPackage, WalletError> {
    token.validate()?;
    if matches!(token.transactions.last(), Some(tx) if tx.inclusion_proof.is_none()) {
        return Err(CoreError::Validation(format!(
            "token {} has an unconfirmed transfer and cannot be spent",
            token.id()
        ))
        .into());
    }
    let commitment = build_transfer_commitment(token.id(), &token.state, intent, signer)?;
    info!(
        token_id = %token.id(),
        request_id = %commitment.request_id,
        recipient = %commitment.transaction_data.recipient,
        "transfer prepared"
    );
    Ok(TransferPackage {
        version: PACKAGE_VERSION.to_string(),
        status: TransferStatus::Prepared,
        token: token.clone(),
        commitment,
    })
}

/// Serializes a prepared package for out-of-band exchange.
pub fn package(transfer: &mut TransferPackage) -> Result<Vec<u8>, WalletError> {
    expect_status(
        "package",
        transfer.status,
        &[TransferStatus::Prepared, TransferStatus::Packaged],
    )?;
    transfer.status = TransferStatus::Packaged;
    Ok(serde_json::to_vec_pretty(transfer)?)
}

/// Parses package bytes on the recipient side. Checks structure only.
pub fn receive(bytes: &[u8]) -> Result<TransferPackage, WalletError> {
    let mut transfer: TransferPackage = serde_json::from_slice(bytes)?;
    if transfer.version != PACKAGE_VERSION {
        return Err(CoreError::invalid_field(
            "version",
            format!("unsupported transfer package version `{}`", transfer.version),
        )
        .into());
    }
    expect_status("receive", transfer.status, &[TransferStatus::Packaged])?;
    transfer.token.validate()?;
    transfer.status = TransferStatus::Exchanged;
    debug!(token_id = %transfer.token.id(), "transfer package received");
    Ok(transfer)
}

/// Verifies a received package and appends the transfer to the token. Offline.
///
/// Checks every proof in the token's history against `trust_anchor`, the
/// genesis against `mint_authority`, the commitment itself, that the
/// commitment spends the token's current state under its predicate, and that
/// `receiver` can satisfy the recipient address. `state_data` becomes the new
/// state's payload and must match the committed recipient data hash, if any.
pub fn finalize(
    transfer: TransferPackage,
    receiver: &ReceiverIdentity,
    trust_anchor: &TrustAnchor,
    mint_authority: &MintAuthority,
    state_data: Option<Vec<u8>>,
) -> Result<PendingTransfer, WalletError> {
    expect_status("finalize", transfer.status, &[TransferStatus::Exchanged])?;
    let TransferPackage { token, commitment, .. } = transfer;

    token.validate()?;
    if matches!(token.transactions.last(), Some(tx) if tx.inclusion_proof.is_none()) {
        return Err(CoreError::Validation("sender's token has an unconfirmed transfer".to_string()).into());
    }
    token.verify_proofs(trust_anchor, mint_authority)?;

    commitment.verify()?;
    let source_hash = token.state_hash()?;
    if *commitment.state_hash() != source_hash {
        return Err(CoreError::DigestMismatch {
            context: "commitment stateHash".to_string(),
            expected: source_hash.to_hex(),
            actual: commitment.state_hash().to_hex(),
        }
        .into());
    }
    let data = &commitment.transaction_data;
    if data.token_id != *token.id() {
        return Err(CoreError::invalid_field("commitment.tokenId", "does not match the packaged token").into());
    }
    if data.source_state != token.state {
        return Err(CoreError::Validation(
            "commitment does not spend the token's current state".to_string(),
        )
        .into());
    }
    token
        .state
        .predicate
        .verify_authenticator(&commitment.authenticator, &commitment.transaction_hash)?;

    let predicate = receiver.predicate_for(token.id(), &token.genesis.data.token_type, &data.salt)?;
    if !predicate.satisfies(&data.recipient)? {
        return Err(CoreError::Validation(format!(
            "receiver cannot satisfy recipient address {}",
            data.recipient
        ))
        .into());
    }

    let state = TokenState::new(predicate, state_data);
    let transaction = Transaction {
        previous_state_hash: source_hash,
        new_state_hash: state.hash(token.id())?,
        predicate: state.predicate.clone(),
        inclusion_proof: None,
        data: data.clone(),
    };
    let token = token.with_transaction(transaction, state)?;
    info!(token_id = %token.id(), request_id = %commitment.request_id, "transfer finalized");

    Ok(PendingTransfer {
        status: TransferStatus::Finalized,
        token,
        commitment,
    })
}

/// Sends the transfer to the aggregator and waits for its proof.
///
/// Calling this again after confirmation returns the confirmed token without
/// contacting the network. Losing the race for the source state yields
/// [`WalletError::Conflict`]; running out of attempts leaves the transfer in
/// `Submitted` so it can be retried.
pub async fn submit<C>(
    client: &C,
    pending: &mut PendingTransfer,
    trust_anchor: &TrustAnchor,
    mint_authority: &MintAuthority,
    retry: &RetryPolicy,
) -> Result<TransferOutcome, WalletError>
where
    C: AggregatorClient + ?Sized,
{
    match pending.status {
        TransferStatus::Confirmed => {
            debug!(token_id = %pending.token.id(), "transfer already confirmed");
            return Ok(TransferOutcome::Confirmed(pending.token.clone()));
        }
        status => expect_status(
            "submit",
            status,
            &[TransferStatus::Finalized, TransferStatus::Submitted],
        )?,
    }
    pending.status = TransferStatus::Submitted;

    let proof = match submit_until_included(client, &pending.commitment, trust_anchor, retry).await {
        Ok(Submission::Included(proof)) => proof,
        Ok(Submission::Rejected(status)) => {
            warn!(request_id = %pending.commitment.request_id, ?status, "transfer refused");
            pending.status = TransferStatus::Failed;
            return Ok(TransferOutcome::Failed(format!("aggregator refused the transfer: {:?}", status)));
        }
        Err(e @ WalletError::Conflict { .. }) => {
            warn!(request_id = %pending.commitment.request_id, "source state already spent elsewhere");
            pending.status = TransferStatus::Failed;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let mut token = pending.token.clone();
    if let Some(last) = token.transactions.last_mut() {
        last.inclusion_proof = Some(proof);
    }
    token.validate()?;
    token.verify_proofs(trust_anchor, mint_authority)?;

    pending.token = token.clone();
    pending.status = TransferStatus::Confirmed;
    info!(token_id = %token.id(), "transfer confirmed");
    Ok(TransferOutcome::Confirmed(token))
}
