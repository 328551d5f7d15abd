//! Proof verification against proofs produced by a populated tree.

use crate::support::network;
use aggregator::{AggregatorClient, InMemoryAggregator, SubmitCommitmentRequest, SubmitStatus};
use token_core::commitment::{Commitment, RequestId};
use token_core::errors::CoreError;
use token_core::hash::{hash, DataHash};
use token_core::proofs::{InclusionProof, ProofOutcome};
use token_core::signing::SigningService;

fn commitment(secret: &str, state: &str, tx: &str) -> anyhow::Result<Commitment<DataHash>> {
    let signer = SigningService::from_secret(secret.as_bytes(), None)?;
    Ok(Commitment::create(hash(tx.as_bytes()), &hash(state.as_bytes()), &signer)?)
}

async fn submit(aggregator: &InMemoryAggregator, c: &Commitment<DataHash>) -> anyhow::Result<SubmitStatus> {
    Ok(aggregator
        .submit_commitment(&SubmitCommitmentRequest::from_commitment(c))
        .await?
        .status)
}

async fn proof(aggregator: &InMemoryAggregator, id: &RequestId) -> anyhow::Result<InclusionProof> {
    Ok(aggregator
        .get_inclusion_proof(id)
        .await?
        .expect("aggregator always answers"))
}

/// Fills the tree with unrelated commitments so paths have real depth.
async fn populated() -> anyhow::Result<(InMemoryAggregator, token_core::certificate::TrustAnchor)> {
    let (aggregator, anchor) = network()?;
    for i in 0..32 {
        let c = commitment(&format!("user-{}", i), "genesis", "tx")?;
        submit(&aggregator, &c).await?;
    }
    Ok((aggregator, anchor))
}

#[test]
fn test_request_id_ignores_transition() -> anyhow::Result<()> {
    let t1 = commitment("s", "state1", "t1")?;
    let t2 = commitment("s", "state1", "t2")?;
    assert_eq!(t1.request_id, t2.request_id);
    assert_ne!(t1.transaction_hash, t2.transaction_hash);
    assert_ne!(t1.authenticator, t2.authenticator);
    Ok(())
}

#[tokio::test]
async fn test_never_submitted_is_excluded() -> anyhow::Result<()> {
    let (aggregator, anchor) = populated().await?;
    for i in 0..16 {
        let c = commitment("nobody", &format!("state-{}", i), "tx")?;
        let p = proof(&aggregator, &c.request_id).await?;
        assert!(p.authenticator.is_none());
        assert!(p.transaction_hash.is_none());
        assert_eq!(p.verify(&anchor, &c.request_id), ProofOutcome::Excluded);
    }
    Ok(())
}

#[tokio::test]
async fn test_identical_resubmission_keeps_proof() -> anyhow::Result<()> {
    let (aggregator, _) = populated().await?;
    let c = commitment("s", "state1", "t1")?;

    assert_eq!(submit(&aggregator, &c).await?, SubmitStatus::Success);
    let first = proof(&aggregator, &c.request_id).await?;
    assert_eq!(submit(&aggregator, &c).await?, SubmitStatus::Success);
    let second = proof(&aggregator, &c.request_id).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_tampering_never_passes() -> anyhow::Result<()> {
    let (aggregator, anchor) = populated().await?;
    let c = commitment("s", "state1", "t1")?;
    submit(&aggregator, &c).await?;
    let good = proof(&aggregator, &c.request_id).await?;
    assert!(good.verify(&anchor, &c.request_id).is_included());

    let invalid = |p: &InclusionProof| matches!(p.verify(&anchor, &c.request_id), ProofOutcome::Invalid(_));

    for byte in [0usize, 31, 63] {
        let mut p = good.clone();
        if let Some(auth) = p.authenticator.as_mut() {
            auth.signature.0[byte] ^= 0x01;
        }
        assert!(invalid(&p), "signature byte {}", byte);
    }

    let mut p = good.clone();
    if let Some(auth) = p.authenticator.as_mut() {
        auth.state_hash = hash(b"state2");
    }
    assert!(invalid(&p));

    let mut p = good.clone();
    let mut root = *p.merkle_tree_path.root.digest();
    root[0] ^= 0x80;
    p.merkle_tree_path.root = DataHash::sha256(root);
    assert!(invalid(&p));

    let mut p = good.clone();
    p.authenticator = None;
    assert!(invalid(&p));

    let mut p = good.clone();
    if let Some(step) = p.merkle_tree_path.steps.get_mut(1) {
        if let Some(data) = step.data.as_mut() {
            data[0] ^= 0x01;
        }
    }
    assert!(invalid(&p));
    Ok(())
}

#[tokio::test]
async fn test_loser_sees_conflict() -> anyhow::Result<()> {
    let (aggregator, anchor) = populated().await?;
    let winner = commitment("s", "state1", "t1")?;
    let loser = commitment("s", "state1", "t2")?;

    assert_eq!(submit(&aggregator, &winner).await?, SubmitStatus::Success);
    assert_eq!(submit(&aggregator, &loser).await?, SubmitStatus::RequestIdExists);

    let p = proof(&aggregator, &loser.request_id).await?;
    assert!(p.verify_commitment(&anchor, &winner)?.is_included());
    assert!(matches!(
        p.verify_commitment(&anchor, &loser),
        Err(CoreError::Conflict { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_proof_json_roundtrip_verifies() -> anyhow::Result<()> {
    let (aggregator, anchor) = populated().await?;
    let c = commitment("s", "state1", "t1")?;
    submit(&aggregator, &c).await?;
    let p = proof(&aggregator, &c.request_id).await?;

    let json = serde_json::to_string(&p)?;
    let back: InclusionProof = serde_json::from_str(&json)?;
    assert_eq!(back.verify(&anchor, &c.request_id), p.verify(&anchor, &c.request_id));
    Ok(())
}
