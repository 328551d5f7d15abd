//! End-to-end offline transfers.

use crate::support::{authority, fast_retry, identity, init_tracing, mint_to, network, token_id, token_type};
use aggregator::{AggregatorClient, InMemoryAggregator, SubmitCommitmentRequest, SubmitStatus};
use futures::join;
use token_core::certificate::TrustAnchor;
use token_core::commitment::{Commitment, TransferTransactionData};
use token_core::errors::CoreError;
use token_core::predicate::TokenState;
use token_core::token::{Token, Transaction};
use token_core::types::Salt;
use wallet::{
    finalize, mint_token, package, prepare, receive, submit, MintRequest, MinterConfig, PendingTransfer,
    ReceiverIdentity, TransferOutcome, TransferStatus, WalletError,
};

/// Runs the offline half of a transfer from `from` to `to`.
fn hand_over(
    token: &Token,
    from: &ReceiverIdentity,
    to: &ReceiverIdentity,
    anchor: &TrustAnchor,
) -> anyhow::Result<PendingTransfer> {
    let address = to.address_for(token.id(), &token.genesis.data.token_type)?;
    let mut transfer = prepare(token, address, from.signer())?;
    let bytes = package(&mut transfer)?;
    let received = receive(&bytes)?;
    Ok(finalize(received, to, anchor, &authority()?, None)?)
}

async fn confirm(
    aggregator: &InMemoryAggregator,
    pending: &mut PendingTransfer,
    anchor: &TrustAnchor,
) -> anyhow::Result<Token> {
    match submit(aggregator, pending, anchor, &authority()?, &fast_retry()).await? {
        TransferOutcome::Confirmed(token) => Ok(token),
        TransferOutcome::Failed(reason) => anyhow::bail!("transfer failed: {}", reason),
    }
}

#[tokio::test]
async fn test_token_changes_hands_twice() -> anyhow::Result<()> {
    init_tracing();
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;
    let carol = identity("carol")?;

    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;

    let mut to_bob = hand_over(&token, &alice, &bob, &anchor)?;
    let bobs = confirm(&aggregator, &mut to_bob, &anchor).await?;
    assert!(bob.owns(&bobs.state.predicate)?);

    let mut to_carol = hand_over(&bobs, &bob, &carol, &anchor)?;
    let carols = confirm(&aggregator, &mut to_carol, &anchor).await?;
    assert!(carol.owns(&carols.state.predicate)?);
    assert_eq!(carols.transactions.len(), 2);
    carols.verify_proofs(&anchor, &authority()?)?;

    // Alice's copy is stale: its state was spent in the first transfer.
    let dave = identity("dave")?;
    let mut double_spend = hand_over(&token, &alice, &dave, &anchor)?;
    let err = submit(&aggregator, &mut double_spend, &anchor, &authority()?, &fast_retry())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Conflict { .. }));
    assert_eq!(double_spend.status(), TransferStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_offline_steps_need_no_network() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;
    let before = aggregator.commitment_count()?;

    // Any call reaching the aggregator now would fail.
    aggregator.fail_next(usize::MAX);
    let pending = hand_over(&token, &alice, &bob, &anchor)?;
    assert_eq!(pending.status(), TransferStatus::Finalized);

    aggregator.fail_next(0);
    assert_eq!(aggregator.commitment_count()?, before);
    Ok(())
}

/// Two transfers spending the same state race; exactly one wins.
#[tokio::test]
async fn test_concurrent_conflicting_transfers() -> anyhow::Result<()> {
    init_tracing();
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;
    let carol = identity("carol")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;

    let mut to_bob = hand_over(&token, &alice, &bob, &anchor)?;
    let mut to_carol = hand_over(&token, &alice, &carol, &anchor)?;
    assert_eq!(to_bob.commitment().request_id, to_carol.commitment().request_id);
    assert_ne!(to_bob.commitment().transaction_hash, to_carol.commitment().transaction_hash);

    let retry = fast_retry();
    let authority = authority()?;
    let (a, b) = join!(
        submit(&aggregator, &mut to_bob, &anchor, &authority, &retry),
        submit(&aggregator, &mut to_carol, &anchor, &authority, &retry)
    );

    let outcomes = [a, b];
    let confirmed = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(TransferOutcome::Confirmed(_))))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(WalletError::Conflict { .. })))
        .count();
    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, 1);
    Ok(())
}

#[tokio::test]
async fn test_submit_survives_outage_and_is_idempotent() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;
    let mut pending = hand_over(&token, &alice, &bob, &anchor)?;

    aggregator.fail_next(2);
    let first = confirm(&aggregator, &mut pending, &anchor).await?;
    let count = aggregator.commitment_count()?;

    let second = confirm(&aggregator, &mut pending, &anchor).await?;
    assert_eq!(first, second);
    assert_eq!(aggregator.commitment_count()?, count);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_budget_can_be_resumed() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;
    let mut pending = hand_over(&token, &alice, &bob, &anchor)?;

    aggregator.fail_next(100);
    let err = submit(&aggregator, &mut pending, &anchor, &authority()?, &fast_retry())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::RetryBudgetExhausted { .. }));
    assert_eq!(pending.status(), TransferStatus::Submitted);

    aggregator.fail_next(0);
    let token = confirm(&aggregator, &mut pending, &anchor).await?;
    token.verify_proofs(&anchor, &authority()?)?;
    Ok(())
}

/// A second genesis for an existing token id, signed by someone other than
/// the configured minter, is accepted by the aggregator but not by receivers.
#[tokio::test]
async fn test_duplicate_from_another_minter_is_rejected() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let mallory = identity("mallory")?;
    let bob = identity("bob")?;
    let genuine = mint_to(&aggregator, &anchor, &alice, "token-A").await?;

    let rogue = MinterConfig {
        secret: hex::encode(b"not the configured minter"),
    };
    let request = MintRequest::new(token_id("token-A"), token_type());
    let forged = mint_token(&aggregator, &rogue, &mallory, request, &anchor, &fast_retry()).await?;
    assert_eq!(forged.id(), genuine.id());
    assert!(matches!(
        forged.verify_proofs(&anchor, &authority()?),
        Err(CoreError::Cryptographic(_))
    ));

    let address = bob.address_for(forged.id(), &forged.genesis.data.token_type)?;
    let mut transfer = prepare(&forged, address, mallory.signer())?;
    let received = receive(&package(&mut transfer)?)?;
    let err = finalize(received, &bob, &anchor, &authority()?, None).unwrap_err();
    assert!(matches!(err, WalletError::Core(CoreError::Cryptographic(_))));
    Ok(())
}

/// A transfer the aggregator included but that the owner never signed does
/// not extend the token's history.
#[tokio::test]
async fn test_transfer_signed_by_non_owner_is_rejected() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let mallory = identity("mallory")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;

    let salt = Salt([3; 32]);
    let predicate = mallory.predicate_for(token.id(), &token.genesis.data.token_type, &salt)?;
    let state = TokenState::new(predicate, None);
    let data = TransferTransactionData {
        token_id: *token.id(),
        source_state: token.state.clone(),
        recipient: state.predicate.address()?,
        salt,
        recipient_data_hash: None,
        message: None,
    };
    let source_hash = token.state_hash()?;
    let commitment = Commitment::create(data, &source_hash, mallory.signer())?;

    let response = aggregator
        .submit_commitment(&SubmitCommitmentRequest::from_commitment(&commitment))
        .await?;
    assert_eq!(response.status, SubmitStatus::Success);
    let proof = aggregator.get_inclusion_proof(&commitment.request_id).await?;

    let transaction = Transaction {
        previous_state_hash: source_hash,
        new_state_hash: state.hash(token.id())?,
        predicate: state.predicate.clone(),
        inclusion_proof: proof,
        data: commitment.transaction_data,
    };
    assert!(matches!(
        token.with_transaction(transaction, state),
        Err(CoreError::Cryptographic(_))
    ));
    Ok(())
}
