//! Fixtures shared by unit tests: single-commitment trees and minted tokens.

use crate::certificate::{TrustAnchor, UnicityCertificate};
use crate::commitment::{
    build_mint_commitment, build_transfer_commitment, Commitment, MintTransactionData, TransferIntent,
};
use crate::encoding::CanonicalEncode;
use crate::hash::DataHash;
use crate::predicate::{Predicate, PredicateKind, TokenState};
use crate::proofs::{
    branch_hash, encode_segment, key_bits, leaf_value, node_hash, InclusionProof, MerkleTreePath,
    PathStep, EMPTY, ROOT_PATH,
};
use crate::signing::{MintAuthority, Signer, SigningService};
use crate::token::{Genesis, Token, Transaction};
use crate::types::{CoinData, CoinId, Salt, TokenId, TokenType};

pub fn validator() -> SigningService {
    SigningService::from_secret(b"validator", None).unwrap()
}

pub fn anchor() -> TrustAnchor {
    TrustAnchor::new(vec![validator().public_key().unwrap()], 1).unwrap()
}

pub fn authority() -> MintAuthority {
    MintAuthority::new(b"minter".to_vec()).unwrap()
}

/// Proof from a tree that holds only `commitment`.
pub fn single_leaf_proof<T: CanonicalEncode>(commitment: &Commitment<T>) -> InclusionProof {
    let value = leaf_value(&commitment.authenticator, &commitment.transaction_hash).unwrap();
    let key = key_bits(&commitment.request_id);
    let leaf_path = encode_segment(&key);
    let leaf = node_hash(&leaf_path, &value);
    let branch = if key[0] {
        branch_hash(&EMPTY, &leaf)
    } else {
        branch_hash(&leaf, &EMPTY)
    };
    let root = DataHash::sha256(node_hash(&ROOT_PATH, &branch));

    InclusionProof {
        merkle_tree_path: MerkleTreePath {
            root,
            steps: vec![
                PathStep {
                    path: leaf_path,
                    data: Some(value.to_vec()),
                },
                PathStep {
                    path: ROOT_PATH.to_vec(),
                    data: None,
                },
            ],
        },
        authenticator: Some(commitment.authenticator.clone()),
        transaction_hash: Some(commitment.transaction_hash),
        unicity_certificate: UnicityCertificate::sign(root, 1, &[validator()]).unwrap(),
    }
}

pub fn token_id() -> TokenId {
    TokenId::from_hash(&crate::hash::hash(b"token-A"))
}

pub fn token_type() -> TokenType {
    TokenType([1; 32])
}

pub fn state_for(owner: &SigningService, token_id: &TokenId, salt: u8, data: Option<Vec<u8>>) -> TokenState {
    let predicate = Predicate::for_signer(
        owner,
        token_id,
        &token_type(),
        &Salt([salt; 32]),
        PredicateKind::Masked,
    )
    .unwrap();
    TokenState::new(predicate, data)
}

/// A confirmed mint of `token-A` to `owner`.
pub fn minted_token(owner: &SigningService) -> Token {
    mint(owner, &token_id())
}

/// A confirmed mint of `token_id` to `owner`.
pub fn mint(owner: &SigningService, token_id: &TokenId) -> Token {
    mint_signed_by(&authority(), owner, token_id)
}

/// A confirmed mint of `token_id` to `owner`, signed by `minter`.
pub fn mint_signed_by(minter: &MintAuthority, owner: &SigningService, token_id: &TokenId) -> Token {
    let state = state_for(owner, token_id, 1, Some(b"state data".to_vec()));
    let data = MintTransactionData {
        token_id: *token_id,
        token_type: token_type(),
        token_data: b"token payload".to_vec(),
        coin_data: CoinData::new(vec![(CoinId([9; 32]), 1_000)]).unwrap(),
        salt: Salt([2; 32]),
        recipient: state.predicate.address().unwrap(),
        recipient_data_hash: state.data_hash(),
        reason: None,
    };
    let commitment = build_mint_commitment(data, &minter.signer_for(token_id).unwrap()).unwrap();
    let proof = single_leaf_proof(&commitment);
    Token::from_genesis(
        Genesis {
            data: commitment.transaction_data,
            inclusion_proof: proof,
        },
        state,
    )
    .unwrap()
}

/// `token` moved from `owner` to `recipient`, confirmed.
pub fn transferred(token: &Token, owner: &SigningService, recipient: &SigningService, salt: u8) -> Token {
    let new_state = state_for(recipient, token.id(), salt, None);
    let intent = TransferIntent {
        recipient: new_state.predicate.address().unwrap(),
        salt: Salt([salt; 32]),
        recipient_data_hash: None,
        message: None,
    };
    let commitment = build_transfer_commitment(token.id(), &token.state, intent, owner).unwrap();
    let transaction = Transaction {
        previous_state_hash: token.state_hash().unwrap(),
        new_state_hash: new_state.hash(token.id()).unwrap(),
        predicate: new_state.predicate.clone(),
        inclusion_proof: Some(single_leaf_proof(&commitment)),
        data: commitment.transaction_data,
    };
    token.with_transaction(transaction, new_state).unwrap()
}
