//! Ownership predicates and the addresses derived from them.
//!
//! A predicate is the condition a spender must satisfy. Its *reference* is a
//! hash of the parts that identify the owner; the address is a one-way
//! rendering of that reference, so checking "does this predicate own this
//! address" always re-derives the address from the predicate.

use crate::commitment::Authenticator;
use crate::encoding::{CanonicalDecoder, CanonicalEncode, CanonicalEncoder};
use crate::errors::CoreError;
use crate::hash::{DataHash, DataHasher, HashAlgorithm};
use crate::signing::Signer;
use crate::types::{PublicKeyBytes, Salt, SignatureAlgorithm, TokenId, TokenType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Engine id of an unmasked (reusable address) predicate.
pub const ENGINE_UNMASKED: u64 = 0;

/// Engine id of a masked (single-use address) predicate.
pub const ENGINE_MASKED: u64 = 1;

/// The only predicate type: ownership by a single public key.
pub const PREDICATE_TYPE_PUBLIC_KEY: &str = "PUBLIC_KEY";

/// Scheme prefix of every address.
pub const ADDRESS_SCHEME: &str = "DIRECT://";

/// Which predicate variant to derive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    /// Address reusable for the key
    Unmasked,
    /// Address unique per mask
    Masked,
}

/// Ownership condition on a token state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Owned by `public_key`; the nonce keeps state hashes unique but is not
    /// part of the address.
    Unmasked {
        /// Signature scheme the owner signs with
        algorithm: SignatureAlgorithm,
        /// The owner's key
        public_key: PublicKeyBytes,
        /// Per-state uniqueness value
        nonce: DataHash,
    },
    /// Owned by `public_key`, hidden behind a per-use mask.
    Masked {
        /// Signature scheme the owner signs with
        algorithm: SignatureAlgorithm,
        /// The owner's key
        public_key: PublicKeyBytes,
        /// Per-use mask folded into the address
        mask: DataHash,
    },
}

/// Derives a predicate for `public_key` on a given token.
///
/// For an unmasked predicate the salt only feeds the state nonce; for a masked
/// predicate it feeds the mask and therefore the address.
pub fn derive_predicate(
    token_id: &TokenId,
    token_type: &TokenType,
    public_key: PublicKeyBytes,
    algorithm: SignatureAlgorithm,
    hash_algorithm: HashAlgorithm,
    salt: &Salt,
    kind: PredicateKind,
) -> Result<Predicate, CoreError> {
    let predicate = match kind {
        PredicateKind::Unmasked => {
            let mut enc = CanonicalEncoder::new();
            enc.array(2)?.value(token_id)?.value(salt)?;
            Predicate::Unmasked {
                algorithm,
                public_key,
                nonce: DataHasher::new(hash_algorithm).update(enc.finish()).finalize(),
            }
        }
        PredicateKind::Masked => {
            let mut enc = CanonicalEncoder::new();
            enc.array(3)?.value(token_id)?.value(token_type)?.value(salt)?;
            Predicate::Masked {
                algorithm,
                public_key,
                mask: DataHasher::new(hash_algorithm).update(enc.finish()).finalize(),
            }
        }
    };
    Ok(predicate)
}

/// Address a predicate's owner receives at.
pub fn predicate_to_address(predicate: &Predicate) -> Result<Address, CoreError> {
    predicate.address()
}

impl Predicate {
    /// Derives a predicate for the signer's own key.
    pub fn for_signer<S: Signer + ?Sized>(
        signer: &S,
        token_id: &TokenId,
        token_type: &TokenType,
        salt: &Salt,
        kind: PredicateKind,
    ) -> Result<Self, CoreError> {
        derive_predicate(
            token_id,
            token_type,
            signer.public_key()?,
            signer.algorithm(),
            HashAlgorithm::Sha256,
            salt,
            kind,
        )
    }

    /// Engine id written into the canonical record.
    pub fn engine_id(&self) -> u64 {
        match self {
            Predicate::Unmasked { .. } => ENGINE_UNMASKED,
            Predicate::Masked { .. } => ENGINE_MASKED,
        }
    }

    /// The owner's key.
    pub fn public_key(&self) -> &PublicKeyBytes {
        match self {
            Predicate::Unmasked { public_key, .. } | Predicate::Masked { public_key, .. } => public_key,
        }
    }

    /// The owner's signature scheme.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Predicate::Unmasked { algorithm, .. } | Predicate::Masked { algorithm, .. } => *algorithm,
        }
    }

    /// Hash of the owner-identifying parts.
    pub fn reference(&self) -> Result<DataHash, CoreError> {
        let mut enc = CanonicalEncoder::new();
        enc.array(3)?;
        enc.u64(self.engine_id());
        enc.text(PREDICATE_TYPE_PUBLIC_KEY)?;
        match self {
            Predicate::Unmasked {
                algorithm,
                public_key,
                ..
            } => {
                enc.array(2)?.text(algorithm.name())?.bytes(&public_key.0)?;
            }
            Predicate::Masked {
                algorithm,
                public_key,
                mask,
            } => {
                enc.array(3)?
                    .text(algorithm.name())?
                    .bytes(&public_key.0)?
                    .hash(mask)?;
            }
        }
        Ok(DataHasher::new(HashAlgorithm::Sha256)
            .update(enc.finish())
            .finalize())
    }

    /// The address this predicate receives at.
    pub fn address(&self) -> Result<Address, CoreError> {
        Ok(Address::from_reference(self.reference()?))
    }

    /// Whether this predicate is the one `address` was derived from.
    pub fn satisfies(&self, address: &Address) -> Result<bool, CoreError> {
        Ok(self.address()? == *address)
    }

    /// Whether `public_key` under `algorithm` may spend a state locked by this predicate.
    pub fn is_owner(&self, algorithm: SignatureAlgorithm, public_key: &PublicKeyBytes) -> bool {
        self.algorithm() == algorithm && self.public_key() == public_key
    }

    /// Checks that `authenticator` was produced by this predicate's owner for
    /// `transaction_hash`.
    pub fn verify_authenticator(
        &self,
        authenticator: &Authenticator,
        transaction_hash: &DataHash,
    ) -> Result<(), CoreError> {
        if !self.is_owner(authenticator.algorithm, &authenticator.public_key) {
            return Err(CoreError::Cryptographic(format!(
                "authenticator key {} does not own this predicate",
                authenticator.public_key.to_hex()
            )));
        }
        authenticator.verify(transaction_hash)
    }

    /// Hash binding this predicate, including its nonce or mask, to a token.
    pub fn hash(&self, token_id: &TokenId) -> Result<DataHash, CoreError> {
        let uniqueness = match self {
            Predicate::Unmasked { nonce, .. } => nonce,
            Predicate::Masked { mask, .. } => mask,
        };
        let mut enc = CanonicalEncoder::new();
        enc.array(3)?
            .hash(&self.reference()?)?
            .value(token_id)?
            .hash(uniqueness)?;
        Ok(DataHasher::new(HashAlgorithm::Sha256)
            .update(enc.finish())
            .finalize())
    }

    /// Decodes the canonical `[engineId, predicateType, parameters]` record.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut dec = CanonicalDecoder::new(bytes);
        if dec.array()? != 3 {
            return Err(CoreError::invalid_field("predicate", "expected a 3-element record"));
        }
        let engine_id = dec.u64()?;
        let predicate_type = dec.text()?;
        if predicate_type != PREDICATE_TYPE_PUBLIC_KEY {
            return Err(CoreError::invalid_field(
                "predicate",
                format!("unsupported predicate type `{}`", predicate_type),
            ));
        }
        if dec.array()? != 3 {
            return Err(CoreError::invalid_field("predicate", "expected 3 parameters"));
        }
        let algorithm = SignatureAlgorithm::from_name(dec.text()?)?;
        let public_key = PublicKeyBytes(dec.fixed_bytes::<32>()?);
        let third = DataHash::from_imprint(dec.bytes()?)?;
        dec.finish()?;

        match engine_id {
            ENGINE_UNMASKED => Ok(Predicate::Unmasked {
                algorithm,
                public_key,
                nonce: third,
            }),
            ENGINE_MASKED => Ok(Predicate::Masked {
                algorithm,
                public_key,
                mask: third,
            }),
            other => Err(CoreError::invalid_field(
                "predicate",
                format!("unknown engine id {}", other),
            )),
        }
    }
}

impl CanonicalEncode for Predicate {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        let (algorithm, public_key, third) = match self {
            Predicate::Unmasked {
                algorithm,
                public_key,
                nonce,
            } => (algorithm, public_key, nonce),
            Predicate::Masked {
                algorithm,
                public_key,
                mask,
            } => (algorithm, public_key, mask),
        };
        enc.array(3)?;
        enc.u64(self.engine_id());
        enc.text(PREDICATE_TYPE_PUBLIC_KEY)?;
        enc.array(3)?
            .text(algorithm.name())?
            .bytes(&public_key.0)?
            .hash(third)?;
        Ok(())
    }
}

impl Serialize for Predicate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = self.canonical_bytes().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex::encode(bytes))
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Predicate::from_canonical_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Spendable recipient locator: `DIRECT://` followed by the hex reference imprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    reference: DataHash,
}

impl Address {
    /// Wraps a predicate reference.
    pub fn from_reference(reference: DataHash) -> Self {
        Self { reference }
    }

    /// The predicate reference this address renders.
    pub fn reference(&self) -> &DataHash {
        &self.reference
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_SCHEME, self.reference.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix(ADDRESS_SCHEME).ok_or_else(|| {
            CoreError::invalid_field("address", format!("missing `{}` scheme", ADDRESS_SCHEME))
        })?;
        let reference = DataHash::from_hex(hex_part)
            .map_err(|e| CoreError::invalid_field("address", e.to_string()))?;
        Ok(Self { reference })
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl CanonicalEncode for Address {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.text(&self.to_string())?;
        Ok(())
    }
}

/// A token's current payload together with the predicate guarding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// Optional application payload of the state
    #[serde(with = "crate::types::opt_hex_bytes")]
    pub data: Option<Vec<u8>>,
    /// Who may spend this state
    pub predicate: Predicate,
}

impl TokenState {
    /// Creates a state.
    pub fn new(predicate: Predicate, data: Option<Vec<u8>>) -> Self {
        Self { predicate, data }
    }

    /// The state hash: commits to the predicate (bound to the token) and the payload.
    pub fn hash(&self, token_id: &TokenId) -> Result<DataHash, CoreError> {
        let mut enc = CanonicalEncoder::new();
        enc.array(2)?
            .hash(&self.predicate.hash(token_id)?)?
            .optional_bytes(self.data.as_deref())?;
        Ok(DataHasher::new(HashAlgorithm::Sha256)
            .update(enc.finish())
            .finalize())
    }

    /// Hash a recipient commits to for this state's payload, if there is one.
    pub fn data_hash(&self) -> Option<DataHash> {
        self.data.as_deref().map(crate::hash::hash)
    }
}
