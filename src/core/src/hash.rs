//! Hashing primitives.
//!
//! Every digest in the protocol is carried together with the algorithm that
//! produced it. The serialized form of a [`DataHash`] is its *imprint*: a
//! big-endian `u16` algorithm id followed by the raw digest bytes.

use crate::errors::CoreError;
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of a SHA-256 imprint in bytes (algorithm id + digest).
pub const IMPRINT_LEN: usize = 2 + DIGEST_LEN;

/// Supported hash algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256
    #[serde(rename = "SHA256")]
    Sha256,
}

impl HashAlgorithm {
    /// The numeric id written into imprints.
    pub fn id(self) -> u16 {
        match self {
            HashAlgorithm::Sha256 => 0,
        }
    }

    /// Looks up an algorithm by its imprint id.
    pub fn from_id(id: u16) -> Result<Self, CoreError> {
        match id {
            0 => Ok(HashAlgorithm::Sha256),
            other => Err(CoreError::Validation(format!(
                "unsupported hash algorithm id {}",
                other
            ))),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

/// A digest tagged with the algorithm that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataHash {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl DataHash {
    /// Wraps an existing digest.
    pub fn new(algorithm: HashAlgorithm, digest: [u8; DIGEST_LEN]) -> Self {
        Self { algorithm, digest }
    }

    /// Wraps an existing SHA-256 digest.
    pub fn sha256(digest: [u8; DIGEST_LEN]) -> Self {
        Self::new(HashAlgorithm::Sha256, digest)
    }

    /// The algorithm tag.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Algorithm id followed by the digest.
    pub fn imprint(&self) -> [u8; IMPRINT_LEN] {
        let mut out = [0u8; IMPRINT_LEN];
        BigEndian::write_u16(&mut out[..2], self.algorithm.id());
        out[2..].copy_from_slice(&self.digest);
        out
    }

    /// Parses an imprint produced by [`DataHash::imprint`].
    pub fn from_imprint(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != IMPRINT_LEN {
            return Err(CoreError::Validation(format!(
                "invalid imprint length: {} (expected {})",
                bytes.len(),
                IMPRINT_LEN
            )));
        }
        let algorithm = HashAlgorithm::from_id(BigEndian::read_u16(&bytes[..2]))?;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[2..]);
        Ok(Self { algorithm, digest })
    }

    /// Hex encoding of the imprint.
    pub fn to_hex(&self) -> String {
        hex::encode(self.imprint())
    }

    /// Parses a hex imprint.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::Validation(format!("invalid hash hex: {}", e)))?;
        Self::from_imprint(&bytes)
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHash({})", self.to_hex())
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for DataHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DataHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DataHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher producing a [`DataHash`].
pub struct DataHasher {
    algorithm: HashAlgorithm,
    inner: Sha256,
}

impl DataHasher {
    /// Creates a hasher for the given algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self {
                algorithm,
                inner: Sha256::new(),
            },
        }
    }

    /// Feeds bytes into the hasher.
    pub fn update(mut self, data: impl AsRef<[u8]>) -> Self {
        self.inner.update(data.as_ref());
        self
    }

    /// Finishes hashing.
    pub fn finalize(self) -> DataHash {
        let result = self.inner.finalize();
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&result);
        DataHash::new(self.algorithm, digest)
    }
}

/// SHA-256 of `data` as a [`DataHash`].
pub fn hash(data: &[u8]) -> DataHash {
    DataHasher::new(HashAlgorithm::Sha256).update(data).finalize()
}

/// Raw SHA-256 of the concatenation of `parts`.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}
