//! Multi-token TXF files built from real mints and transfers.

use crate::support::{authority, fast_retry, identity, mint_to, minter, network, token_id, token_type};
use token_core::errors::CoreError;
use token_core::txf::TxfFile;
use wallet::{finalize, mint_token, package, prepare, receive, submit, MintRequest, TransferOutcome};

#[tokio::test]
async fn test_wallet_file_roundtrip() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let bob = identity("bob")?;

    let first = mint_to(&aggregator, &anchor, &alice, "token-A").await?;
    let second = mint_to(&aggregator, &anchor, &alice, "token-B").await?;

    // Move token-B to bob so the file holds a token with history.
    let address = bob.address_for(second.id(), &second.genesis.data.token_type)?;
    let mut transfer = prepare(&second, address, alice.signer())?;
    let received = receive(&package(&mut transfer)?)?;
    let mut pending = finalize(received, &bob, &anchor, &authority()?, Some(b"bob's note".to_vec()))?;
    let moved = match submit(&aggregator, &mut pending, &anchor, &authority()?, &fast_retry()).await? {
        TransferOutcome::Confirmed(token) => token,
        TransferOutcome::Failed(reason) => anyhow::bail!("transfer failed: {}", reason),
    };

    let mut file = TxfFile::new();
    file.insert(first.clone())?;
    file.insert(moved.clone())?;
    file.seal()?;

    let bytes = file.encode()?;
    let decoded = TxfFile::decode(&bytes)?;
    assert_eq!(decoded, file);
    assert_eq!(decoded.get(first.id()), Some(&first));
    assert_eq!(decoded.get(moved.id()), Some(&moved));
    for token in decoded.tokens() {
        token.verify_proofs(&anchor, &authority()?)?;
    }
    Ok(())
}

#[tokio::test]
async fn test_edited_state_is_rejected() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let request = MintRequest {
        state_data: Some(b"committed".to_vec()),
        ..MintRequest::new(token_id("token-A"), token_type())
    };
    let token = mint_token(&aggregator, &minter(), &alice, request, &anchor, &fast_retry()).await?;

    let mut file = TxfFile::new();
    file.insert(token.clone())?;
    let mut json: serde_json::Value = serde_json::from_slice(&file.encode()?)?;

    let key = format!("_{}", token.id().to_hex());
    json[&key]["state"]["data"] = serde_json::Value::String("00ff".to_string());
    let err = TxfFile::decode(&serde_json::to_vec(&json)?).unwrap_err();
    assert!(matches!(err, CoreError::ChainIntegrity { .. }), "unexpected error {}", err);
    Ok(())
}

#[tokio::test]
async fn test_edited_genesis_is_rejected() -> anyhow::Result<()> {
    let (aggregator, anchor) = network()?;
    let alice = identity("alice")?;
    let token = mint_to(&aggregator, &anchor, &alice, "token-A").await?;

    let mut file = TxfFile::new();
    file.insert(token.clone())?;
    let mut json: serde_json::Value = serde_json::from_slice(&file.encode()?)?;

    let key = format!("_{}", token.id().to_hex());
    json[&key]["genesis"]["data"]["tokenData"] = serde_json::Value::String("beef".to_string());
    let err = TxfFile::decode(&serde_json::to_vec(&json)?).unwrap_err();
    assert!(matches!(err, CoreError::DigestMismatch { .. }), "unexpected error {}", err);
    Ok(())
}
