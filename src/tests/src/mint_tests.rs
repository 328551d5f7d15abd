//! Mint scenarios against the in-memory aggregator.

use crate::support::{authority, fast_retry, identity, init_tracing, minter, mint_to, network, token_id, token_type};
use aggregator::{AggregatorClient, SubmitCommitmentRequest, SubmitStatus};
use token_core::commitment::{build_mint_commitment, MintTransactionData};
use token_core::encoding::CanonicalEncode;
use token_core::proofs::ProofOutcome;
use token_core::signing::SigningService;
use token_core::token::{decode_token, encode_token};
use token_core::types::{CoinData, CoinId, Salt};
use wallet::{mint_token, prepare_mint, MintRequest};

/// Mint of `token-A` is included with the hash of its canonical transaction data.
#[tokio::test]
async fn test_mint_token_a_is_included() -> anyhow::Result<()> {
    init_tracing();
    let (aggregator, anchor) = network()?;
    let owner = identity("alice")?;

    let salt = Salt([0x5a; 32]);
    let recipient = owner.address_for(&token_id("token-A"), &token_type())?;
    let data = MintTransactionData {
        token_id: token_id("token-A"),
        token_type: token_type(),
        token_data: b"collectible #1".to_vec(),
        coin_data: CoinData::from_decimal(&[(CoinId([1; 32]), "1000000000000000000000")])?,
        salt,
        recipient,
        recipient_data_hash: None,
        reason: None,
    };
    let signer = SigningService::for_mint(&minter().secret_bytes()?, &data.token_id)?;
    let commitment = build_mint_commitment(data, &signer)?;

    let response = aggregator
        .submit_commitment(&SubmitCommitmentRequest::from_commitment(&commitment))
        .await?;
    assert_eq!(response.status, SubmitStatus::Success);

    let proof = aggregator
        .get_inclusion_proof(&commitment.request_id)
        .await?
        .expect("aggregator always answers");
    match proof.verify(&anchor, &commitment.request_id) {
        ProofOutcome::Included {
            transaction_hash, ..
        } => {
            assert_eq!(transaction_hash, commitment.transaction_data.canonical_hash()?);
        }
        other => panic!("expected inclusion, got {}", other),
    }
    Ok(())
}

/// Building the same mint twice gives byte-identical commitments.
#[test]
fn test_mint_commitment_is_deterministic() -> anyhow::Result<()> {
    let owner = identity("alice")?;
    let request = MintRequest {
        salt: Salt([1; 32]),
        ..MintRequest::new(token_id("token-A"), token_type())
    };
    let (a, _) = prepare_mint(&minter(), &owner, request.clone())?;
    let (b, _) = prepare_mint(&minter(), &owner, request)?;
    assert_eq!(a.request_id, b.request_id);
    assert_eq!(a.transaction_hash, b.transaction_hash);
    assert_eq!(a.authenticator, b.authenticator);
    Ok(())
}

/// A minted token survives the token codec and still verifies.
#[tokio::test]
async fn test_minted_token_roundtrip() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let owner = identity("alice")?;
    let token = mint_to(&aggregator, &anchor, &owner, "token-A").await?;

    let decoded = decode_token(&encode_token(&token)?)?;
    assert_eq!(decoded, token);
    decoded.verify_proofs(&anchor, &authority()?)?;
    Ok(())
}

/// Minting survives transient aggregator outages within the retry budget.
#[tokio::test]
async fn test_mint_retries_through_outage() -> anyhow::Result<()> {
    init_tracing();
    let (aggregator, anchor) = network()?;
    let owner = identity("alice")?;
    aggregator.fail_next(3);

    let request = MintRequest::new(token_id("token-R"), token_type());
    let token = mint_token(&aggregator, &minter(), &owner, request, &anchor, &fast_retry()).await?;
    token.verify_proofs(&anchor, &authority()?)?;
    Ok(())
}

/// Two distinct tokens each get their own leaf.
#[tokio::test]
async fn test_many_mints_share_one_tree() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let owner = identity("alice")?;
    let mut tokens = Vec::new();
    for i in 0..8 {
        tokens.push(mint_to(&aggregator, &anchor, &owner, &format!("token-{}", i)).await?);
    }
    assert_eq!(aggregator.commitment_count()?, 8);

    // Earlier proofs were certified against earlier roots; fresh ones still verify.
    for token in &tokens {
        let auth = token
            .genesis
            .inclusion_proof
            .authenticator
            .as_ref()
            .expect("genesis proof has an authenticator");
        let request_id = auth.request_id();
        let proof = aggregator
            .get_inclusion_proof(&request_id)
            .await?
            .expect("aggregator always answers");
        assert!(proof.verify(&anchor, &request_id).is_included());
    }
    Ok(())
}
