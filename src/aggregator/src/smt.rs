//! Radix tree of accepted commitments, keyed by request id.
//!
//! Produces the paths that [`MerkleTreePath::verify`] checks. Hashes are
//! recomputed on demand.

use token_core::commitment::RequestId;
use token_core::errors::CoreError;
use token_core::hash::{DataHash, DIGEST_LEN};
use token_core::proofs::{
    branch_hash, encode_segment, key_bits, node_hash, Bits, MerkleTreePath, PathStep, EMPTY,
    ROOT_PATH,
};
use bitvec::prelude::*;

type Digest = [u8; DIGEST_LEN];

enum Node {
    Leaf {
        segment: Bits,
        value: Digest,
    },
    Internal {
        segment: Bits,
        children: [Box<Node>; 2],
    },
}

impl Node {
    fn segment(&self) -> &Bits {
        match self {
            Node::Leaf { segment, .. } | Node::Internal { segment, .. } => segment,
        }
    }

    fn segment_mut(&mut self) -> &mut Bits {
        match self {
            Node::Leaf { segment, .. } | Node::Internal { segment, .. } => segment,
        }
    }

    /// Leaf value, or the branch hash of an internal node.
    fn value(&self) -> Digest {
        match self {
            Node::Leaf { value, .. } => *value,
            Node::Internal { children, .. } => branch_hash(&children[0].hash(), &children[1].hash()),
        }
    }

    fn hash(&self) -> Digest {
        node_hash(&encode_segment(self.segment()), &self.value())
    }
}

fn common_prefix(a: &BitSlice<u8, Lsb0>, b: &BitSlice<u8, Lsb0>) -> usize {
    a.iter()
        .by_vals()
        .zip(b.iter().by_vals())
        .take_while(|(x, y)| x == y)
        .count()
}

// `key` is the remainder of the full key, starting where `node`'s segment starts.
fn insert_at(node: &mut Box<Node>, key: &BitSlice<u8, Lsb0>, value: Digest) -> Result<(), CoreError> {
    let segment_len = node.segment().len();
    let common = common_prefix(node.segment(), key);

    if common == segment_len {
        return match node.as_mut() {
            Node::Leaf { .. } => Err(CoreError::Validation("key is already in the tree".to_string())),
            Node::Internal { children, .. } => {
                let direction = key[segment_len] as usize;
                insert_at(&mut children[direction], &key[segment_len..], value)
            }
        };
    }

    let placeholder = Box::new(Node::Leaf {
        segment: Bits::new(),
        value: EMPTY,
    });
    let mut existing = std::mem::replace(node, placeholder);
    let shared = existing.segment()[..common].to_bitvec();
    let rest = existing.segment()[common..].to_bitvec();
    *existing.segment_mut() = rest;

    let leaf = Box::new(Node::Leaf {
        segment: key[common..].to_bitvec(),
        value,
    });
    let children = if key[common] {
        [existing, leaf]
    } else {
        [leaf, existing]
    };
    *node = Box::new(Node::Internal {
        segment: shared,
        children,
    });
    Ok(())
}

/// The tree. The root consumes no key bits; either of its slots may be empty.
#[derive(Default)]
pub struct RadixTree {
    children: [Option<Box<Node>>; 2],
    len: usize,
}

impl RadixTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a leaf for `request_id`. Existing keys are never overwritten.
    pub fn insert(&mut self, request_id: &RequestId, value: Digest) -> Result<(), CoreError> {
        let key = key_bits(request_id);
        let direction = key[0] as usize;
        match &mut self.children[direction] {
            Some(node) => insert_at(node, &key, value).map_err(|_| {
                CoreError::Validation(format!("request {} is already in the tree", request_id))
            })?,
            None => {
                self.children[direction] = Some(Box::new(Node::Leaf {
                    segment: key,
                    value,
                }))
            }
        }
        self.len += 1;
        Ok(())
    }

    fn slot_hash(&self, direction: usize) -> Option<Digest> {
        self.children[direction].as_ref().map(|node| node.hash())
    }

    /// Current root hash.
    pub fn root(&self) -> DataHash {
        let left = self.slot_hash(0).unwrap_or(EMPTY);
        let right = self.slot_hash(1).unwrap_or(EMPTY);
        DataHash::sha256(node_hash(&ROOT_PATH, &branch_hash(&left, &right)))
    }

    /// The inclusion or exclusion path for `request_id`.
    pub fn path(&self, request_id: &RequestId) -> MerkleTreePath {
        let key = key_bits(request_id);
        let direction = key[0] as usize;

        // Ancestors top-down, root first.
        let mut ancestors = vec![PathStep {
            path: ROOT_PATH.to_vec(),
            data: self.slot_hash(1 - direction).map(|h| h.to_vec()),
        }];

        let reached = match self.children[direction].as_ref() {
            None => PathStep {
                path: encode_segment(&key[..1]),
                data: None,
            },
            Some(node) => {
                let mut node: &Node = node.as_ref();
                let mut offset = 0;
                loop {
                    let segment = node.segment();
                    let end = offset + segment.len();
                    match node {
                        Node::Internal { children, .. } if key[offset..end] == segment[..] => {
                            let direction = key[end] as usize;
                            ancestors.push(PathStep {
                                path: encode_segment(segment),
                                data: Some(children[1 - direction].hash().to_vec()),
                            });
                            node = children[direction].as_ref();
                            offset = end;
                        }
                        _ => {
                            break PathStep {
                                path: encode_segment(segment),
                                data: Some(node.value().to_vec()),
                            }
                        }
                    }
                }
            }
        };

        let mut steps = Vec::with_capacity(ancestors.len() + 1);
        steps.push(reached);
        steps.extend(ancestors.into_iter().rev());
        MerkleTreePath {
            root: self.root(),
            steps,
        }
    }
}
