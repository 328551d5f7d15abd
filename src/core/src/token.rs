//! The token object graph: genesis, current state and transaction history.
//!
//! Decoding validates in a fixed order (structure, integrity, state, chain) and
//! reports the first mismatch. Nothing is repaired.

use crate::certificate::TrustAnchor;
use crate::commitment::{mint_source_state, MintTransactionData, RequestId, TransferTransactionData};
use crate::encoding::CanonicalEncode;
use crate::errors::CoreError;
use crate::hash::DataHash;
use crate::predicate::{Address, Predicate, TokenState};
use crate::proofs::{InclusionProof, ProofOutcome};
use crate::signing::MintAuthority;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The only token format version this crate reads and writes.
pub const TOKEN_VERSION: &str = "2.0";

/// The mint that created a token and its proof of acceptance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub data: MintTransactionData,
    pub inclusion_proof: InclusionProof,
}

/// One ownership change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub previous_state_hash: DataHash,
    pub new_state_hash: DataHash,
    /// Predicate of the new state
    pub predicate: Predicate,
    /// `None` while the transfer has not been confirmed by the network.
    pub inclusion_proof: Option<InclusionProof>,
    /// The signed transfer; its source state names who had to authorize it.
    pub data: TransferTransactionData,
}

/// Integrity digest stored alongside a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIntegrity {
    #[serde(rename = "genesisDataJSONHash")]
    pub genesis_data_json_hash: DataHash,
}

/// A complete token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub version: String,
    pub genesis: Genesis,
    pub state: TokenState,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub nametags: Vec<serde_json::Value>,
    #[serde(rename = "_integrity")]
    pub integrity: TokenIntegrity,
}

fn chain_error(context: impl Into<String>, expected: &DataHash, actual: &DataHash) -> CoreError {
    CoreError::ChainIntegrity {
        context: context.into(),
        expected: expected.to_hex(),
        actual: actual.to_hex(),
    }
}

fn address_error(context: &str, expected: &Address, actual: &Address) -> CoreError {
    CoreError::ChainIntegrity {
        context: context.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

fn check_recipient_data(
    context: &str,
    committed: Option<&DataHash>,
    state: &TokenState,
) -> Result<(), CoreError> {
    if let Some(committed) = committed {
        let actual = state.data_hash().ok_or_else(|| {
            CoreError::Validation(format!("{}: recipient data hash set but state has no data", context))
        })?;
        if actual != *committed {
            return Err(chain_error(context, committed, &actual));
        }
    }
    Ok(())
}

impl Token {
    /// Assembles a freshly minted token.
    pub fn from_genesis(genesis: Genesis, state: TokenState) -> Result<Self, CoreError> {
        let integrity = TokenIntegrity {
            genesis_data_json_hash: genesis.data.canonical_hash()?,
        };
        let token = Self {
            version: TOKEN_VERSION.to_string(),
            genesis,
            state,
            transactions: Vec::new(),
            nametags: Vec::new(),
            integrity,
        };
        token.validate()?;
        Ok(token)
    }

    /// The token's identity.
    pub fn id(&self) -> &TokenId {
        &self.genesis.data.token_id
    }

    /// Hash of the current state.
    pub fn state_hash(&self) -> Result<DataHash, CoreError> {
        self.state.hash(self.id())
    }

    /// Returns a copy with `transaction` appended and `state` as the new current state.
    pub fn with_transaction(&self, transaction: Transaction, state: TokenState) -> Result<Self, CoreError> {
        let mut next = self.clone();
        next.transactions.push(transaction);
        next.state = state;
        next.validate()?;
        Ok(next)
    }

    /// Runs every structural, integrity, state and chain check.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.validate_structure()?;
        self.validate_integrity()?;
        self.validate_state()?;
        self.validate_chain()?;
        debug!(token_id = %self.id(), transactions = self.transactions.len(), "validated token");
        Ok(())
    }

    fn validate_structure(&self) -> Result<(), CoreError> {
        if self.version != TOKEN_VERSION {
            return Err(CoreError::invalid_field(
                "version",
                format!("unsupported version `{}`", self.version),
            ));
        }
        let last = self.transactions.len().saturating_sub(1);
        for (i, tx) in self.transactions.iter().enumerate() {
            if tx.inclusion_proof.is_none() && i != last {
                return Err(CoreError::invalid_field(
                    format!("transactions[{}].inclusionProof", i),
                    "only the latest transaction may be unconfirmed",
                ));
            }
        }
        Ok(())
    }

    fn validate_integrity(&self) -> Result<(), CoreError> {
        let actual = self.genesis.data.canonical_hash()?;
        if actual != self.integrity.genesis_data_json_hash {
            return Err(CoreError::DigestMismatch {
                context: "_integrity.genesisDataJSONHash".to_string(),
                expected: actual.to_hex(),
                actual: self.integrity.genesis_data_json_hash.to_hex(),
            });
        }
        Ok(())
    }

    fn validate_state(&self) -> Result<(), CoreError> {
        let state_hash = self.state_hash()?;
        let state_address = self.state.predicate.address()?;

        match self.transactions.last() {
            Some(tx) => {
                if tx.new_state_hash != state_hash {
                    return Err(chain_error("state vs. last newStateHash", &tx.new_state_hash, &state_hash));
                }
                if tx.predicate != self.state.predicate {
                    return Err(CoreError::Validation(
                        "state predicate differs from the last transaction's predicate".to_string(),
                    ));
                }
                if tx.data.recipient != state_address {
                    return Err(address_error("last transaction recipient", &tx.data.recipient, &state_address));
                }
                check_recipient_data("last transaction recipientDataHash", tx.data.recipient_data_hash.as_ref(), &self.state)?;
            }
            None => {
                let genesis = &self.genesis.data;
                if genesis.recipient != state_address {
                    return Err(address_error("genesis recipient", &genesis.recipient, &state_address));
                }
                check_recipient_data("genesis recipientDataHash", genesis.recipient_data_hash.as_ref(), &self.state)?;
            }
        }
        Ok(())
    }

    fn validate_chain(&self) -> Result<(), CoreError> {
        let token_id = self.id();
        let genesis_hash = self.integrity.genesis_data_json_hash;

        if let Some(auth) = &self.genesis.inclusion_proof.authenticator {
            let mint_state = mint_source_state(token_id)?;
            if auth.state_hash != mint_state {
                return Err(chain_error("genesis authenticator stateHash", &mint_state, &auth.state_hash));
            }
        }
        if let Some(tx_hash) = &self.genesis.inclusion_proof.transaction_hash {
            if *tx_hash != genesis_hash {
                return Err(chain_error("genesis transactionHash", &genesis_hash, tx_hash));
            }
        }

        for (i, tx) in self.transactions.iter().enumerate() {
            let context = |what: &str| format!("transactions[{}].{}", i, what);

            if i > 0 {
                let prev = &self.transactions[i - 1];
                if tx.previous_state_hash != prev.new_state_hash {
                    return Err(chain_error(context("previousStateHash"), &prev.new_state_hash, &tx.previous_state_hash));
                }
            }

            let data = &tx.data;
            if data.token_id != *token_id {
                return Err(CoreError::invalid_field(context("data.tokenId"), "belongs to another token"));
            }
            let source_hash = data.source_state.hash(token_id)?;
            if tx.previous_state_hash != source_hash {
                return Err(chain_error(context("previousStateHash"), &source_hash, &tx.previous_state_hash));
            }
            match i {
                0 => {
                    let source_address = data.source_state.predicate.address()?;
                    let genesis_recipient = &self.genesis.data.recipient;
                    if source_address != *genesis_recipient {
                        return Err(address_error(&context("data.sourceState"), genesis_recipient, &source_address));
                    }
                }
                _ => {
                    if data.source_state.predicate != self.transactions[i - 1].predicate {
                        return Err(CoreError::Validation(format!(
                            "{} is not the previous transaction's predicate",
                            context("data.sourceState.predicate")
                        )));
                    }
                }
            }
            let recipient = tx.predicate.address()?;
            if data.recipient != recipient {
                return Err(address_error(&context("data.recipient"), &data.recipient, &recipient));
            }

            if let Some(proof) = &tx.inclusion_proof {
                if let Some(auth) = &proof.authenticator {
                    if auth.state_hash != tx.previous_state_hash {
                        return Err(chain_error(context("authenticator.stateHash"), &tx.previous_state_hash, &auth.state_hash));
                    }
                    let owner = data.source_state.predicate.public_key();
                    if auth.public_key != *owner {
                        return Err(CoreError::Cryptographic(format!(
                            "{} is not the key of the spent state's owner",
                            context("authenticator.publicKey")
                        )));
                    }
                }
                if let Some(tx_hash) = &proof.transaction_hash {
                    let expected = data.canonical_hash()?;
                    if *tx_hash != expected {
                        return Err(chain_error(context("transactionHash"), &expected, tx_hash));
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-verifies the genesis proof and every confirmed transaction proof.
    ///
    /// The genesis must be signed by `mint_authority`'s key for this token and
    /// each transfer by the owner of the state it spends. An unconfirmed latest
    /// transaction is allowed; its authorization is checked by whoever holds
    /// its commitment.
    pub fn verify_proofs(&self, trust_anchor: &TrustAnchor, mint_authority: &MintAuthority) -> Result<(), CoreError> {
        let token_id = self.id();
        let genesis_proof = &self.genesis.inclusion_proof;
        let minter = genesis_proof
            .authenticator
            .as_ref()
            .ok_or_else(|| CoreError::Validation("genesis proof has no authenticator".to_string()))?;
        let minter_key = mint_authority.public_key_for(token_id)?;
        if minter.public_key != minter_key {
            return Err(CoreError::Cryptographic(format!(
                "genesis of token {} is signed by {}, not the configured minter",
                token_id,
                minter.public_key.to_hex()
            )));
        }
        let request_id = RequestId::create(&minter_key, &mint_source_state(token_id)?);
        expect_included(
            "genesis",
            genesis_proof.verify(trust_anchor, &request_id),
            &self.integrity.genesis_data_json_hash,
        )?;

        for (i, tx) in self.transactions.iter().enumerate() {
            let proof = match &tx.inclusion_proof {
                Some(proof) => proof,
                None => continue,
            };
            let owner_key = tx.data.source_state.predicate.public_key();
            let request_id = RequestId::create(owner_key, &tx.previous_state_hash);
            let expected_tx = tx.data.canonical_hash()?;
            expect_included(
                &format!("transactions[{}]", i),
                proof.verify(trust_anchor, &request_id),
                &expected_tx,
            )?;
        }
        Ok(())
    }
}

fn expect_included(context: &str, outcome: ProofOutcome, expected_tx: &DataHash) -> Result<(), CoreError> {
    match outcome {
        ProofOutcome::Included {
            transaction_hash, ..
        } if transaction_hash == *expected_tx => Ok(()),
        ProofOutcome::Included {
            transaction_hash, ..
        } => Err(chain_error(format!("{} proof transactionHash", context), expected_tx, &transaction_hash)),
        ProofOutcome::Excluded => Err(CoreError::Cryptographic(format!(
            "{} proof shows the commitment was not accepted",
            context
        ))),
        ProofOutcome::Invalid(reason) => Err(CoreError::Cryptographic(format!(
            "{} proof is invalid: {}",
            context, reason
        ))),
    }
}

/// Serializes a token to JSON.
pub fn encode_token(token: &Token) -> Result<Vec<u8>, CoreError> {
    Ok(serde_json::to_vec_pretty(token)?)
}

/// Parses and fully validates a token.
pub fn decode_token(bytes: &[u8]) -> Result<Token, CoreError> {
    let token: Token = serde_json::from_slice(bytes)?;
    token.validate()?;
    Ok(token)
}
