//! Minting: build the mint commitment, get it included, assemble the token.

use crate::config::{MinterConfig, RetryPolicy};
use crate::errors::WalletError;
use crate::identity::ReceiverIdentity;
use crate::submission::{submit_until_included, Submission};
use aggregator::client::AggregatorClient;
use token_core::certificate::TrustAnchor;
use token_core::commitment::{build_mint_commitment, MintCommitment, MintTransactionData};
use token_core::predicate::TokenState;
use token_core::signing::MintAuthority;
use token_core::token::{Genesis, Token};
use token_core::types::{CoinData, Salt, TokenId, TokenType};
use tracing::info;

/// What to mint and under which salt.
#[derive(Clone, Debug)]
pub struct MintRequest {
    pub token_id: TokenId,
    pub token_type: TokenType,
    pub token_data: Vec<u8>,
    pub coin_data: CoinData,
    pub salt: Salt,
    /// Payload of the first state; its hash is committed in the mint
    pub state_data: Option<Vec<u8>>,
    pub reason: Option<Vec<u8>>,
}

impl MintRequest {
    /// A plain mint with no payload, coins or state data and a random salt.
    pub fn new(token_id: TokenId, token_type: TokenType) -> Self {
        Self {
            token_id,
            token_type,
            token_data: Vec::new(),
            coin_data: CoinData::default(),
            salt: Salt::random(),
            state_data: None,
            reason: None,
        }
    }
}

fn authority(minter: &MinterConfig) -> Result<MintAuthority, WalletError> {
    minter
        .authority()
        .map_err(|e| WalletError::Config(format!("minter secret: {}", e)))
}

/// Builds the mint commitment and the first state for `receiver`. Offline.
pub fn prepare_mint(
    minter: &MinterConfig,
    receiver: &ReceiverIdentity,
    request: MintRequest,
) -> Result<(MintCommitment, TokenState), WalletError> {
    let signer = authority(minter)?.signer_for(&request.token_id)?;

    let predicate = receiver.predicate_for(&request.token_id, &request.token_type, &request.salt)?;
    let state = TokenState::new(predicate, request.state_data);
    let data = MintTransactionData {
        token_id: request.token_id,
        token_type: request.token_type,
        token_data: request.token_data,
        coin_data: request.coin_data,
        salt: request.salt,
        recipient: state.predicate.address()?,
        recipient_data_hash: state.data_hash(),
        reason: request.reason,
    };
    let commitment = build_mint_commitment(data, &signer)?;
    Ok((commitment, state))
}

/// Mints a token to `receiver` and returns it once the network has included the mint.
pub async fn mint_token<C>(
    client: &C,
    minter: &MinterConfig,
    receiver: &ReceiverIdentity,
    request: MintRequest,
    trust_anchor: &TrustAnchor,
    retry: &RetryPolicy,
) -> Result<Token, WalletError>
where
    C: AggregatorClient + ?Sized,
{
    let (commitment, state) = prepare_mint(minter, receiver, request)?;
    let proof = match submit_until_included(client, &commitment, trust_anchor, retry).await? {
        Submission::Included(proof) => proof,
        Submission::Rejected(status) => {
            return Err(WalletError::Rejected(format!(
                "mint of {} refused with {:?}",
                commitment.transaction_data.token_id, status
            )))
        }
    };

    let token = Token::from_genesis(
        Genesis {
            data: commitment.transaction_data,
            inclusion_proof: proof,
        },
        state,
    )?;
    token.verify_proofs(trust_anchor, &authority(minter)?)?;
    info!(token_id = %token.id(), "token minted");
    Ok(token)
}
