//! Shared fixtures for the scenario tests.

use aggregator::InMemoryAggregator;
use token_core::certificate::TrustAnchor;
use token_core::hash::hash;
use token_core::signing::{MintAuthority, SigningService};
use token_core::token::Token;
use token_core::types::{TokenId, TokenType};
use tracing_subscriber::EnvFilter;
use wallet::{mint_token, MintRequest, MinterConfig, ReceiverIdentity, RetryPolicy};

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An aggregator and the anchor that trusts it.
pub fn network() -> anyhow::Result<(InMemoryAggregator, TrustAnchor)> {
    let aggregator = InMemoryAggregator::new()?;
    let anchor = aggregator.trust_anchor()?;
    Ok((aggregator, anchor))
}

pub fn minter() -> MinterConfig {
    MinterConfig {
        secret: hex::encode(b"test minter"),
    }
}

/// The authority every genesis minted by [`minter`] is checked against.
pub fn authority() -> anyhow::Result<MintAuthority> {
    Ok(MintAuthority::new(b"test minter".to_vec())?)
}

pub fn identity(name: &str) -> anyhow::Result<ReceiverIdentity> {
    Ok(ReceiverIdentity::masked(SigningService::from_secret(name.as_bytes(), None)?))
}

pub fn token_id(name: &str) -> TokenId {
    TokenId::from_hash(&hash(name.as_bytes()))
}

pub fn token_type() -> TokenType {
    TokenType([0x10; 32])
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
        multiplier: 2,
        call_timeout_ms: 2_000,
    }
}

/// Mints token `name` to `owner` and waits for inclusion.
pub async fn mint_to(
    aggregator: &InMemoryAggregator,
    anchor: &TrustAnchor,
    owner: &ReceiverIdentity,
    name: &str,
) -> anyhow::Result<Token> {
    let request = MintRequest::new(token_id(name), token_type());
    Ok(mint_token(aggregator, &minter(), owner, request, anchor, &fast_retry()).await?)
}
