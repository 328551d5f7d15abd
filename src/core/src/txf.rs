//! TXF: the portable multi-token container.
//!
//! A TXF document is a JSON object. Each token sits under `_<tokenId hex>`; the
//! reserved `_integrity` key optionally carries a digest over every token's
//! genesis hash.

use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::hash::{DataHash, DataHasher, HashAlgorithm};
use crate::token::Token;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const INTEGRITY_KEY: &str = "_integrity";

/// File-level integrity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIntegrity {
    pub tokens_hash: DataHash,
}

/// A set of tokens keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxfFile {
    tokens: BTreeMap<TokenId, Token>,
    integrity: Option<FileIntegrity>,
}

fn token_key(token_id: &TokenId) -> String {
    format!("_{}", token_id.to_hex())
}

impl TxfFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validated token, replacing any earlier copy with the same id.
    pub fn insert(&mut self, token: Token) -> Result<Option<Token>, CoreError> {
        token.validate()?;
        // The stored digest no longer covers the contents.
        self.integrity = None;
        Ok(self.tokens.insert(*token.id(), token))
    }

    pub fn get(&self, token_id: &TokenId) -> Option<&Token> {
        self.tokens.get(token_id)
    }

    pub fn remove(&mut self, token_id: &TokenId) -> Option<Token> {
        self.integrity = None;
        self.tokens.remove(token_id)
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn integrity(&self) -> Option<&FileIntegrity> {
        self.integrity.as_ref()
    }

    /// Digest over the sorted `(tokenId, genesisDataJSONHash)` pairs.
    pub fn tokens_hash(&self) -> Result<DataHash, CoreError> {
        let mut enc = CanonicalEncoder::new();
        enc.array(self.tokens.len())?;
        for (token_id, token) in &self.tokens {
            enc.array(2)?
                .value(token_id)?
                .hash(&token.integrity.genesis_data_json_hash)?;
        }
        Ok(DataHasher::new(HashAlgorithm::Sha256)
            .update(enc.finish())
            .finalize())
    }

    /// Computes and stores the file-level integrity record.
    pub fn seal(&mut self) -> Result<(), CoreError> {
        self.integrity = Some(FileIntegrity {
            tokens_hash: self.tokens_hash()?,
        });
        Ok(())
    }

    /// Serializes the file to JSON.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut object = Map::new();
        for (token_id, token) in &self.tokens {
            object.insert(token_key(token_id), serde_json::to_value(token)?);
        }
        if let Some(integrity) = &self.integrity {
            object.insert(INTEGRITY_KEY.to_string(), serde_json::to_value(integrity)?);
        }
        Ok(serde_json::to_vec_pretty(&Value::Object(object))?)
    }

    /// Parses a file and validates every token, its key, and the file digest.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let object = match value {
            Value::Object(object) => object,
            _ => return Err(CoreError::Validation("TXF document must be a JSON object".to_string())),
        };

        let mut file = TxfFile::new();
        let mut integrity = None;
        for (key, value) in object {
            if key == INTEGRITY_KEY {
                integrity = Some(serde_json::from_value::<FileIntegrity>(value)?);
                continue;
            }
            let key_id: TokenId = key
                .strip_prefix('_')
                .ok_or_else(|| CoreError::invalid_field(key.clone(), "token keys start with `_`"))?
                .parse()
                .map_err(|e: CoreError| CoreError::invalid_field(key.clone(), e.to_string()))?;

            let token: Token = serde_json::from_value(value)?;
            if *token.id() != key_id {
                return Err(CoreError::invalid_field(
                    key,
                    format!("key does not match genesis tokenId {}", token.id()),
                ));
            }
            token.validate()?;
            file.tokens.insert(key_id, token);
        }

        if let Some(stored) = integrity {
            let actual = file.tokens_hash()?;
            if actual != stored.tokens_hash {
                return Err(CoreError::DigestMismatch {
                    context: "_integrity.tokensHash".to_string(),
                    expected: actual.to_hex(),
                    actual: stored.tokens_hash.to_hex(),
                });
            }
            file.integrity = Some(stored);
        }
        debug!(tokens = file.len(), sealed = file.integrity.is_some(), "decoded TXF file");
        Ok(file)
    }
}
