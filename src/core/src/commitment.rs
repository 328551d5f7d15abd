//! Commitments: the `(requestId, transactionHash, authenticator)` triple the
//! network accepts for a mint or a transfer.
//!
//! The request id depends only on the signer's key and the source state hash.
//! Two different transitions signed by the same key from the same state share a
//! request id; the network decides which one wins.

use crate::encoding::{CanonicalEncode, CanonicalEncoder};
use crate::errors::CoreError;
use crate::hash::{DataHash, DataHasher, HashAlgorithm};
use crate::predicate::{Address, TokenState};
use crate::signing::{verify_signature, Signer};
use crate::types::{CoinData, PublicKeyBytes, Salt, Signature, SignatureAlgorithm, TokenId, TokenType};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Suffix hashed with the token id to form the source state of a mint.
pub const MINT_SUFFIX: &[u8] = b"TOKEN_MINT_STATE";

/// The fixed "state" a mint spends from.
pub fn mint_source_state(token_id: &TokenId) -> Result<DataHash, CoreError> {
    let mut enc = CanonicalEncoder::new();
    enc.array(2)?.value(token_id)?.bytes(MINT_SUFFIX)?;
    Ok(DataHasher::new(HashAlgorithm::Sha256)
        .update(enc.finish())
        .finalize())
}

/// Binds an owner key to a source state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(DataHash);

impl RequestId {
    /// `hash(publicKey ‖ stateHash.imprint)`.
    pub fn create(public_key: &PublicKeyBytes, state_hash: &DataHash) -> Self {
        Self(
            DataHasher::new(HashAlgorithm::Sha256)
                .update(public_key.0)
                .update(state_hash.imprint())
                .finalize(),
        )
    }

    /// Wraps an already computed id.
    pub fn from_hash(hash: DataHash) -> Self {
        Self(hash)
    }

    /// The underlying hash.
    pub fn hash(&self) -> &DataHash {
        &self.0
    }

    /// Hex imprint.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0.to_hex())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// Proof that the owner of `public_key` authorized a transition from `state_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    /// Signature scheme
    pub algorithm: SignatureAlgorithm,
    /// Signer's key
    pub public_key: PublicKeyBytes,
    /// Signature over `transactionHash.imprint ‖ stateHash.imprint`
    pub signature: Signature,
    /// The source state being spent
    pub state_hash: DataHash,
}

impl Authenticator {
    /// The exact bytes that get signed.
    pub fn signing_message(transaction_hash: &DataHash, state_hash: &DataHash) -> Vec<u8> {
        let mut message = Vec::with_capacity(2 * crate::hash::IMPRINT_LEN);
        message.extend_from_slice(&transaction_hash.imprint());
        message.extend_from_slice(&state_hash.imprint());
        message
    }

    /// Signs a transition.
    pub fn create<S: Signer + ?Sized>(
        signer: &S,
        transaction_hash: &DataHash,
        state_hash: &DataHash,
    ) -> Result<Self, CoreError> {
        let public_key = signer.public_key()?;
        let signature = signer.sign(&Self::signing_message(transaction_hash, state_hash))?;
        Ok(Self {
            algorithm: signer.algorithm(),
            public_key,
            signature,
            state_hash: *state_hash,
        })
    }

    /// Checks the signature against `transaction_hash` and the embedded state hash.
    pub fn verify(&self, transaction_hash: &DataHash) -> Result<(), CoreError> {
        verify_signature(
            self.algorithm,
            &self.public_key,
            &Self::signing_message(transaction_hash, &self.state_hash),
            &self.signature,
        )
    }

    /// The request id this authenticator answers for.
    pub fn request_id(&self) -> RequestId {
        RequestId::create(&self.public_key, &self.state_hash)
    }
}

impl CanonicalEncode for Authenticator {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.array(4)?
            .text(self.algorithm.name())?
            .bytes(&self.public_key.0)?
            .bytes(&self.signature.0)?
            .hash(&self.state_hash)?;
        Ok(())
    }
}

/// Payload of a mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionData {
    pub token_id: TokenId,
    pub token_type: TokenType,
    /// Immutable token payload
    #[serde(with = "crate::types::hex_bytes")]
    pub token_data: Vec<u8>,
    pub coin_data: CoinData,
    pub salt: Salt,
    /// First owner
    pub recipient: Address,
    /// Hash of the state data the recipient will hold, if any
    pub recipient_data_hash: Option<DataHash>,
    /// Optional reference justifying the mint (e.g. a split parent)
    #[serde(with = "crate::types::opt_hex_bytes")]
    pub reason: Option<Vec<u8>>,
}

impl CanonicalEncode for MintTransactionData {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.array(8)?
            .value(&self.token_id)?
            .value(&self.token_type)?
            .bytes(&self.token_data)?
            .value(&self.coin_data)?
            .value(&self.salt)?
            .value(&self.recipient)?
            .optional(self.recipient_data_hash.as_ref())?
            .optional_bytes(self.reason.as_deref())?;
        Ok(())
    }
}

/// Payload of a transfer.
///
/// The full source state travels with the transfer so a recipient can link it
/// to the previous owner without extra lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransactionData {
    pub token_id: TokenId,
    pub source_state: TokenState,
    pub recipient: Address,
    pub salt: Salt,
    pub recipient_data_hash: Option<DataHash>,
    #[serde(with = "crate::types::opt_hex_bytes")]
    pub message: Option<Vec<u8>>,
}

impl CanonicalEncode for TransferTransactionData {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.array(6)?
            .value(&self.token_id)?
            .hash(&self.source_state.hash(&self.token_id)?)?
            .value(&self.recipient)?
            .value(&self.salt)?
            .optional(self.recipient_data_hash.as_ref())?
            .optional_bytes(self.message.as_deref())?;
        Ok(())
    }
}

/// What a sender wants to happen to a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferIntent {
    pub recipient: Address,
    pub salt: Salt,
    pub recipient_data_hash: Option<DataHash>,
    pub message: Option<Vec<u8>>,
}

/// A signed, ready-to-submit transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment<T> {
    pub request_id: RequestId,
    pub transaction_data: T,
    pub transaction_hash: DataHash,
    pub authenticator: Authenticator,
}

/// Commitment to a mint.
pub type MintCommitment = Commitment<MintTransactionData>;

/// Commitment to a transfer.
pub type TransferCommitment = Commitment<TransferTransactionData>;

impl<T: CanonicalEncode> Commitment<T> {
    /// Binds `transaction_data` to `state_hash` under `signer`.
    pub fn create<S: Signer + ?Sized>(
        transaction_data: T,
        state_hash: &DataHash,
        signer: &S,
    ) -> Result<Self, CoreError> {
        let transaction_hash = transaction_data.canonical_hash()?;
        let authenticator = Authenticator::create(signer, &transaction_hash, state_hash)?;
        let request_id = RequestId::create(&authenticator.public_key, state_hash);
        debug!(
            request_id = %request_id,
            transaction_hash = %transaction_hash,
            "built commitment"
        );
        Ok(Self {
            request_id,
            transaction_data,
            transaction_hash,
            authenticator,
        })
    }

    /// Recomputes every derived value and checks the signature.
    pub fn verify(&self) -> Result<(), CoreError> {
        let transaction_hash = self.transaction_data.canonical_hash()?;
        if transaction_hash != self.transaction_hash {
            return Err(CoreError::DigestMismatch {
                context: "commitment transactionHash".to_string(),
                expected: transaction_hash.to_hex(),
                actual: self.transaction_hash.to_hex(),
            });
        }
        let request_id = self.authenticator.request_id();
        if request_id != self.request_id {
            return Err(CoreError::DigestMismatch {
                context: "commitment requestId".to_string(),
                expected: request_id.to_hex(),
                actual: self.request_id.to_hex(),
            });
        }
        self.authenticator.verify(&self.transaction_hash)
    }

    /// The source state this commitment spends.
    pub fn state_hash(&self) -> &DataHash {
        &self.authenticator.state_hash
    }
}

/// Builds a mint commitment; the source state is derived from the token id.
pub fn build_mint_commitment<S: Signer + ?Sized>(
    data: MintTransactionData,
    signer: &S,
) -> Result<MintCommitment, CoreError> {
    let state_hash = mint_source_state(&data.token_id)?;
    Commitment::create(data, &state_hash, signer)
}

/// Builds a mint commitment from its individual fields.
#[allow(clippy::too_many_arguments)]
pub fn build_mint_commitment_from_parts<S: Signer + ?Sized>(
    token_id: TokenId,
    token_type: TokenType,
    token_data: Vec<u8>,
    coin_data: CoinData,
    recipient: Address,
    salt: Salt,
    recipient_data_hash: Option<DataHash>,
    reason: Option<Vec<u8>>,
    signer: &S,
) -> Result<MintCommitment, CoreError> {
    build_mint_commitment(
        MintTransactionData {
            token_id,
            token_type,
            token_data,
            coin_data,
            salt,
            recipient,
            recipient_data_hash,
            reason,
        },
        signer,
    )
}

/// Builds a transfer commitment spending `current_state` of `token_id`.
///
/// Fails with a validation error when the signer does not own the state.
pub fn build_transfer_commitment<S: Signer + ?Sized>(
    token_id: &TokenId,
    current_state: &TokenState,
    intent: TransferIntent,
    signer: &S,
) -> Result<TransferCommitment, CoreError> {
    let public_key = signer.public_key()?;
    if !current_state.predicate.is_owner(signer.algorithm(), &public_key) {
        return Err(CoreError::Validation(format!(
            "signer {} does not own the current state of token {}",
            public_key.to_hex(),
            token_id
        )));
    }
    let state_hash = current_state.hash(token_id)?;
    let data = TransferTransactionData {
        token_id: *token_id,
        source_state: current_state.clone(),
        recipient: intent.recipient,
        salt: intent.salt,
        recipient_data_hash: intent.recipient_data_hash,
        message: intent.message,
    };
    Commitment::create(data, &state_hash, signer)
}
