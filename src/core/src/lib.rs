//! Core primitives for token commitments and transfers.
//!
//! This crate provides deterministic hashing and canonical encoding, the
//! ownership predicate model, the commitment builder, the proof verifier, and
//! the TXF token file codec. Nothing in here performs I/O or keeps global state:
//! signers and trust anchors are always passed in by the caller.

pub mod certificate;
pub mod commitment;
pub mod encoding;
pub mod errors;
pub mod hash;
pub mod predicate;
pub mod proofs;
pub mod signing;
pub mod token;
pub mod txf;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use certificate::{TrustAnchor, UnicityCertificate};
pub use commitment::{
    build_mint_commitment, build_mint_commitment_from_parts, build_transfer_commitment,
    Authenticator, Commitment, MintCommitment, MintTransactionData, RequestId, TransferCommitment,
    TransferIntent, TransferTransactionData,
};
pub use encoding::CanonicalEncode;
pub use errors::CoreError;
pub use hash::{hash, DataHash};
pub use predicate::{derive_predicate, predicate_to_address, Address, Predicate, PredicateKind, TokenState};
pub use proofs::{InclusionProof, MerkleTreePath, ProofOutcome};
pub use signing::{MintAuthority, Signer, SigningService};
pub use token::{decode_token, encode_token, Genesis, Token, Transaction};
pub use txf::TxfFile;
pub use types::{CoinData, CoinId, Salt, TokenId, TokenType};
