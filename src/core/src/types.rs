//! Core types for token commitments.

use crate::encoding::{CanonicalEncode, CanonicalEncoder};
use crate::errors::CoreError;
use crate::hash::DataHash;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Parses a hex string into a fixed-size byte array.
pub fn decode_hex_array<const N: usize>(field: &str, s: &str) -> Result<[u8; N], CoreError> {
    let bytes = hex::decode(s).map_err(|e| CoreError::invalid_field(field, e.to_string()))?;
    if bytes.len() != N {
        return Err(CoreError::invalid_field(
            field,
            format!("expected {} bytes, got {}", N, bytes.len()),
        ));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Declares a 32-byte identifier serialized as 64 hex characters.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Hex encoding of the raw bytes.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// The raw bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex_array::<32>($field, s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl CanonicalEncode for $name {
            fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
                enc.bytes(&self.0)?;
                Ok(())
            }
        }
    };
}

hex_id!(
    /// Unique 256-bit token identity, fixed at genesis.
    TokenId,
    "tokenId"
);

hex_id!(
    /// Application-defined token kind.
    TokenType,
    "tokenType"
);

hex_id!(
    /// 32 bytes of randomness used for predicates and mint data.
    Salt,
    "salt"
);

hex_id!(
    /// Identifier of a fungible coin carried by a token.
    CoinId,
    "coinId"
);

impl TokenId {
    /// Token id taken from the digest of a hash, e.g. `hash("token-A")`.
    pub fn from_hash(hash: &DataHash) -> Self {
        Self(*hash.digest())
    }
}

impl Salt {
    /// Draws a fresh salt from the operating system's CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKeyBytes(pub [u8; 32]);

impl PublicKeyBytes {
    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for PublicKeyBytes {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex_array::<32>("publicKey", s).map(Self)
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Signature, represented as a 64-byte array.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Hex encoding of the signature.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

// Signatures travel as hex strings in every JSON document
impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 64-byte signature as 128 hex characters")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                decode_hex_array::<64>("signature", v)
                    .map(Signature)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_str(SignatureVisitor)
    }
}

/// Signature schemes an authenticator can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Ed25519 over the raw message
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl SignatureAlgorithm {
    /// Stable name used inside canonical encodings.
    pub fn name(self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ed25519",
        }
    }

    /// Looks up an algorithm by name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "ed25519" => Ok(SignatureAlgorithm::Ed25519),
            other => Err(CoreError::Validation(format!(
                "unsupported signature algorithm `{}`",
                other
            ))),
        }
    }
}

/// Parses a coin amount from its decimal text form.
///
/// Only plain non-negative integers are accepted: no sign, exponent, fraction,
/// leading zeros, or non-finite spellings such as `NaN` and `Infinity`.
pub fn parse_amount(text: &str) -> Result<u128, CoreError> {
    let canonical = !text.is_empty()
        && text.bytes().all(|b| b.is_ascii_digit())
        && (text == "0" || !text.starts_with('0'));
    if !canonical {
        return Err(CoreError::Encoding(format!(
            "amount `{}` is not a canonical non-negative integer",
            text
        )));
    }
    text.parse::<u128>()
        .map_err(|_| CoreError::Encoding(format!("amount `{}` does not fit in 128 bits", text)))
}

/// The fungible coin ledger carried by a token, in the order it was minted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoinData(Vec<(CoinId, u128)>);

impl CoinData {
    /// Builds a ledger, rejecting duplicate coin ids.
    pub fn new(coins: Vec<(CoinId, u128)>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for (coin_id, _) in &coins {
            if !seen.insert(*coin_id) {
                return Err(CoreError::invalid_field(
                    "coinData",
                    format!("duplicate coin id {}", coin_id),
                ));
            }
        }
        Ok(Self(coins))
    }

    /// Builds a ledger from decimal amount strings.
    pub fn from_decimal(coins: &[(CoinId, &str)]) -> Result<Self, CoreError> {
        let parsed = coins
            .iter()
            .map(|(id, amount)| parse_amount(amount).map(|a| (*id, a)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// The coins in ledger order.
    pub fn coins(&self) -> &[(CoinId, u128)] {
        &self.0
    }

    /// Amount held for a coin id, if present.
    pub fn amount(&self, coin_id: &CoinId) -> Option<u128> {
        self.0.iter().find(|(id, _)| id == coin_id).map(|(_, a)| *a)
    }
}

impl CanonicalEncode for CoinData {
    fn encode_into(&self, enc: &mut CanonicalEncoder) -> Result<(), CoreError> {
        enc.array(self.0.len())?;
        for (coin_id, amount) in &self.0 {
            enc.array(2)?;
            enc.value(coin_id)?;
            enc.u128(*amount);
        }
        Ok(())
    }
}

impl Serialize for CoinData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pairs: Vec<(&CoinId, String)> = self
            .0
            .iter()
            .map(|(id, amount)| (id, amount.to_string()))
            .collect();
        pairs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoinData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Amounts are read as raw JSON values so that floats are rejected
        // instead of being silently truncated.
        let pairs: Vec<(CoinId, serde_json::Value)> = Vec::deserialize(deserializer)?;
        let mut coins = Vec::with_capacity(pairs.len());
        for (coin_id, raw) in pairs {
            let amount = match &raw {
                serde_json::Value::String(s) => parse_amount(s),
                serde_json::Value::Number(n) => match n.as_u64() {
                    Some(v) => Ok(u128::from(v)),
                    None => Err(CoreError::Encoding(format!(
                        "amount {} is not a non-negative integer",
                        n
                    ))),
                },
                other => Err(CoreError::Encoding(format!("amount {} is not a number", other))),
            }
            .map_err(serde::de::Error::custom)?;
            coins.push((coin_id, amount));
        }
        CoinData::new(coins).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for byte strings carried as hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes bytes as a hex string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserializes a hex string into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional byte strings carried as hex or `null`.
pub mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes optional bytes as a hex string or `null`.
    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_str(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes a hex string or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
