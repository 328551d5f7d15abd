//! Inclusion and exclusion proofs for request ids.
//!
//! The network keeps accepted commitments in a radix tree keyed by the request
//! id, read as a big-endian integer and consumed from its least significant
//! bit. Every node carries the key segment of the edge leading to it.
//!
//! A step's `path` is the big-endian byte encoding of an integer whose highest
//! set bit is a sentinel; the bits below it are the segment, least significant
//! first. The root's path is `01`, the empty segment. Path values are handled
//! as raw bytes throughout and never go through a numeric parser.
//!
//! Steps run from the reached node up to the root:
//!
//! * `steps[0]` is the reached node: its `data` is a leaf value, the branch hash
//!   of an internal node the key diverges from, or null for an empty slot.
//! * every later step is an ancestor; its `data` is the sibling hash of the
//!   child below it, or null when that sibling slot is empty.

use crate::certificate::{TrustAnchor, UnicityCertificate};
use crate::commitment::{Authenticator, Commitment, RequestId};
use crate::encoding::CanonicalEncode;
use crate::errors::CoreError;
use crate::hash::{sha256_concat, DataHash, HashAlgorithm, DIGEST_LEN};
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Bit sequence of a key or segment, least significant bit first.
pub type Bits = BitVec<u8, Lsb0>;

/// Hash standing in for an empty subtree.
pub const EMPTY: [u8; DIGEST_LEN] = [0u8; DIGEST_LEN];

/// Number of bits in a request id key.
pub const KEY_BITS: usize = 256;

/// Path value of the root: only the sentinel bit.
pub const ROOT_PATH: [u8; 1] = [0x01];

// 256 segment bits plus the sentinel.
const MAX_PATH_BYTES: usize = KEY_BITS / 8 + 1;

/// The key bits of a request id.
pub fn key_bits(request_id: &RequestId) -> Bits {
    let mut bytes = *request_id.hash().digest();
    bytes.reverse();
    Bits::from_slice(&bytes)
}

/// Encodes a segment as a sentinel-prefixed big-endian integer.
pub fn encode_segment(segment: &BitSlice<u8, Lsb0>) -> Vec<u8> {
    let len = segment.len();
    let mut little_endian = vec![0u8; len / 8 + 1];
    for index in segment.iter_ones() {
        little_endian[index / 8] |= 1 << (index % 8);
    }
    little_endian[len / 8] |= 1 << (len % 8);
    little_endian.reverse();
    little_endian
}

/// Decodes a path value into its segment bits.
pub fn decode_segment(path: &[u8]) -> Result<Bits, CoreError> {
    if path.len() > MAX_PATH_BYTES {
        return Err(CoreError::invalid_field(
            "path",
            format!("{} bytes is longer than any key segment", path.len()),
        ));
    }
    match path.first() {
        None => return Err(CoreError::invalid_field("path", "empty path value")),
        Some(0) => {
            return Err(CoreError::invalid_field(
                "path",
                "leading zero byte (no sentinel or non-minimal encoding)",
            ))
        }
        Some(_) => {}
    }
    let mut little_endian = path.to_vec();
    little_endian.reverse();
    let bits = Bits::from_vec(little_endian);
    let sentinel = bits
        .last_one()
        .ok_or_else(|| CoreError::invalid_field("path", "missing sentinel bit"))?;
    Ok(bits[..sentinel].to_bitvec())
}

/// Hash of a node: its path value and the value below it.
pub fn node_hash(path: &[u8], value: &[u8; DIGEST_LEN]) -> [u8; DIGEST_LEN] {
    let len = (path.len() as u32).to_be_bytes();
    sha256_concat(&[&len, path, value])
}

/// Hash of an internal node's two children.
pub fn branch_hash(left: &[u8; DIGEST_LEN], right: &[u8; DIGEST_LEN]) -> [u8; DIGEST_LEN] {
    sha256_concat(&[left, right])
}

/// The value stored at a request id's leaf.
pub fn leaf_value(
    authenticator: &Authenticator,
    transaction_hash: &DataHash,
) -> Result<[u8; DIGEST_LEN], CoreError> {
    Ok(sha256_concat(&[
        &authenticator.canonical_bytes()?,
        &transaction_hash.imprint(),
    ]))
}

fn as_digest(field: &str, bytes: &[u8]) -> Result<[u8; DIGEST_LEN], CoreError> {
    <[u8; DIGEST_LEN]>::try_from(bytes).map_err(|_| {
        CoreError::invalid_field(field, format!("expected {} bytes, got {}", DIGEST_LEN, bytes.len()))
    })
}

/// One node on the way from the reached node to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    #[serde(with = "crate::types::hex_bytes")]
    pub path: Vec<u8>,
    #[serde(with = "crate::types::opt_hex_bytes")]
    pub data: Option<Vec<u8>>,
}

/// What a structurally sound path that reduces to its root says about a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathVerification {
    /// The key's leaf is present and holds `leaf_value`.
    Included {
        leaf_value: [u8; DIGEST_LEN],
    },
    /// The key is provably absent.
    Excluded,
}

/// Authenticated radix-tree path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTreePath {
    pub root: DataHash,
    pub steps: Vec<PathStep>,
}

impl MerkleTreePath {
    /// Recomputes the root and decides inclusion or exclusion of `request_id`.
    pub fn verify(&self, request_id: &RequestId) -> Result<PathVerification, CoreError> {
        if self.steps.len() < 2 {
            return Err(CoreError::Validation(
                "path needs at least the reached node and the root".to_string(),
            ));
        }
        let segments = self
            .steps
            .iter()
            .map(|step| decode_segment(&step.path))
            .collect::<Result<Vec<_>, _>>()?;

        let last = segments.len() - 1;
        if !segments[last].is_empty() {
            return Err(CoreError::Validation("last step is not the root".to_string()));
        }
        if segments[..last].iter().any(|s| s.is_empty()) {
            return Err(CoreError::Validation("empty segment below the root".to_string()));
        }
        let total: usize = segments.iter().map(|s| s.len()).sum();
        if total > KEY_BITS {
            return Err(CoreError::Validation(format!(
                "path covers {} bits, keys have {}",
                total, KEY_BITS
            )));
        }

        let reached = &self.steps[0];
        let mut current = match &reached.data {
            Some(data) => node_hash(&reached.path, &as_digest("data", data)?),
            None if segments[0].len() == 1 => EMPTY,
            None => {
                return Err(CoreError::Validation(
                    "an empty slot must be a single bit".to_string(),
                ))
            }
        };
        for i in 1..self.steps.len() {
            let sibling = match &self.steps[i].data {
                Some(data) => as_digest("data", data)?,
                None => EMPTY,
            };
            let branch = if segments[i - 1][0] {
                branch_hash(&sibling, &current)
            } else {
                branch_hash(&current, &sibling)
            };
            current = node_hash(&self.steps[i].path, &branch);
        }

        let computed = DataHash::sha256(current);
        if self.root.algorithm() != HashAlgorithm::Sha256 || computed != self.root {
            return Err(CoreError::DigestMismatch {
                context: "merkle path root".to_string(),
                expected: self.root.to_hex(),
                actual: computed.to_hex(),
            });
        }

        let mut reconstructed = Bits::with_capacity(total);
        for segment in segments.iter().rev() {
            reconstructed.extend_from_bitslice(segment);
        }
        let key = key_bits(request_id);

        if let Some(data) = &reached.data {
            if total == KEY_BITS && reconstructed[..] == key[..] {
                return Ok(PathVerification::Included {
                    leaf_value: as_digest("data", data)?,
                });
            }
        }

        // The reached node must hang off the key's own path; below that the
        // key either lands in an empty slot or leaves the reached node's segment.
        let prefix = total - segments[0].len();
        let hangs_off_key = reconstructed[..=prefix] == key[..=prefix];
        let diverges = reached.data.is_none() || reconstructed[..] != key[..total];
        if hangs_off_key && diverges {
            Ok(PathVerification::Excluded)
        } else {
            Err(CoreError::Validation(format!(
                "path neither includes nor excludes request {}",
                request_id
            )))
        }
    }
}

/// Result of checking an [`InclusionProof`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofOutcome {
    /// The request id is bound to this transition.
    Included {
        state_hash: DataHash,
        transaction_hash: DataHash,
    },
    /// Nothing has been committed under the request id.
    Excluded,
    /// The proof cannot be trusted.
    Invalid(String),
}

impl ProofOutcome {
    pub fn is_included(&self) -> bool {
        matches!(self, ProofOutcome::Included { .. })
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, ProofOutcome::Excluded)
    }
}

impl fmt::Display for ProofOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofOutcome::Included {
                transaction_hash, ..
            } => write!(f, "included (transaction {})", transaction_hash),
            ProofOutcome::Excluded => write!(f, "excluded"),
            ProofOutcome::Invalid(reason) => write!(f, "invalid: {}", reason),
        }
    }
}

/// Proof returned by the network for a request id.
///
/// `authenticator` and `transactionHash` are both null for an exclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub merkle_tree_path: MerkleTreePath,
    pub authenticator: Option<Authenticator>,
    pub transaction_hash: Option<DataHash>,
    pub unicity_certificate: UnicityCertificate,
}

impl InclusionProof {
    /// Verifies this proof for `request_id` under `trust_anchor`.
    pub fn verify(&self, trust_anchor: &TrustAnchor, request_id: &RequestId) -> ProofOutcome {
        let outcome = self.evaluate(trust_anchor, request_id);
        debug!(request_id = %request_id, outcome = %outcome, "verified inclusion proof");
        outcome
    }

    fn evaluate(&self, trust_anchor: &TrustAnchor, request_id: &RequestId) -> ProofOutcome {
        if let Err(e) = trust_anchor.verify(&self.unicity_certificate, &self.merkle_tree_path.root) {
            return ProofOutcome::Invalid(format!("certificate: {}", e));
        }
        let path = match self.merkle_tree_path.verify(request_id) {
            Ok(path) => path,
            Err(e) => return ProofOutcome::Invalid(format!("merkle path: {}", e)),
        };

        match (&self.authenticator, &self.transaction_hash, path) {
            (None, None, PathVerification::Excluded) => ProofOutcome::Excluded,
            (None, None, PathVerification::Included { .. }) => ProofOutcome::Invalid(
                "path includes the request id but the proof has no authenticator".to_string(),
            ),
            (Some(_), Some(_), PathVerification::Excluded) => ProofOutcome::Invalid(
                "proof has an authenticator but the path excludes the request id".to_string(),
            ),
            (Some(authenticator), Some(transaction_hash), PathVerification::Included { leaf_value: leaf }) => {
                check_inclusion(authenticator, transaction_hash, &leaf, request_id)
            }
            _ => ProofOutcome::Invalid(
                "authenticator and transactionHash must both be present or both be null".to_string(),
            ),
        }
    }

    /// Verifies this proof against the caller's own commitment.
    ///
    /// Inclusion of a different transaction under the same request id is a
    /// [`CoreError::Conflict`].
    pub fn verify_commitment<T>(
        &self,
        trust_anchor: &TrustAnchor,
        commitment: &Commitment<T>,
    ) -> Result<ProofOutcome, CoreError> {
        let outcome = self.verify(trust_anchor, &commitment.request_id);
        if let ProofOutcome::Included {
            transaction_hash, ..
        } = &outcome
        {
            if *transaction_hash != commitment.transaction_hash {
                return Err(CoreError::Conflict {
                    request_id: commitment.request_id.to_hex(),
                    submitted: commitment.transaction_hash.to_hex(),
                    committed: transaction_hash.to_hex(),
                });
            }
        }
        Ok(outcome)
    }
}

fn check_inclusion(
    authenticator: &Authenticator,
    transaction_hash: &DataHash,
    leaf: &[u8; DIGEST_LEN],
    request_id: &RequestId,
) -> ProofOutcome {
    match leaf_value(authenticator, transaction_hash) {
        Ok(expected) if expected == *leaf => {}
        Ok(_) => {
            return ProofOutcome::Invalid(
                "leaf value does not match authenticator and transactionHash".to_string(),
            )
        }
        Err(e) => return ProofOutcome::Invalid(e.to_string()),
    }
    let bound = authenticator.request_id();
    if bound != *request_id {
        return ProofOutcome::Invalid(format!(
            "authenticator answers for request {}, not {}",
            bound, request_id
        ));
    }
    if let Err(e) = authenticator.verify(transaction_hash) {
        return ProofOutcome::Invalid(e.to_string());
    }
    ProofOutcome::Included {
        state_hash: authenticator.state_hash,
        transaction_hash: *transaction_hash,
    }
}
