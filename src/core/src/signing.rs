//! Signing identities.
//!
//! Builders never reach for an implicit key: every operation that signs takes
//! a [`Signer`] argument.

use crate::errors::CoreError;
use crate::hash::sha256_concat;
use crate::types::{PublicKeyBytes, Signature, SignatureAlgorithm, TokenId};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer as _, Verifier};
use std::fmt;

/// Something that can authorize a transition.
pub trait Signer {
    /// The signature scheme this signer produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// The public key matching produced signatures.
    fn public_key(&self) -> Result<PublicKeyBytes, CoreError>;

    /// Signs `message`.
    fn sign(&self, message: &[u8]) -> Result<Signature, CoreError>;
}

/// Ed25519 signer derived deterministically from a secret.
pub struct SigningService {
    keypair: Keypair,
}

impl SigningService {
    /// Derives a key from `secret`, optionally diversified by `nonce`.
    ///
    /// The Ed25519 seed is `SHA-256(secret ‖ nonce)`.
    pub fn from_secret(secret: &[u8], nonce: Option<&[u8]>) -> Result<Self, CoreError> {
        if secret.is_empty() {
            return Err(CoreError::Key("secret must not be empty".to_string()));
        }
        let seed = sha256_concat(&[secret, nonce.unwrap_or(&[])]);
        let secret_key = SecretKey::from_bytes(&seed)
            .map_err(|e| CoreError::Key(format!("invalid secret key: {}", e)))?;
        let public_key = PublicKey::from(&secret_key);

        Ok(Self {
            keypair: Keypair {
                secret: secret_key,
                public: public_key,
            },
        })
    }

    /// The signer that authorizes mints of `token_id`.
    ///
    /// The minter secret is supplied by configuration; the key differs per token.
    pub fn for_mint(minter_secret: &[u8], token_id: &TokenId) -> Result<Self, CoreError> {
        Self::from_secret(minter_secret, Some(token_id.as_bytes()))
    }
}

/// The configured minter, able to sign mints or name the key a mint must carry.
#[derive(Clone)]
pub struct MintAuthority {
    secret: Vec<u8>,
}

impl MintAuthority {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CoreError::Key("minter secret must not be empty".to_string()));
        }
        Ok(Self { secret })
    }

    /// The signer for the mint of `token_id`.
    pub fn signer_for(&self, token_id: &TokenId) -> Result<SigningService, CoreError> {
        SigningService::for_mint(&self.secret, token_id)
    }

    /// The only key accepted on the genesis of `token_id`.
    pub fn public_key_for(&self, token_id: &TokenId) -> Result<PublicKeyBytes, CoreError> {
        self.signer_for(token_id)?.public_key()
    }
}

impl fmt::Debug for MintAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MintAuthority(<redacted>)")
    }
}

impl fmt::Debug for SigningService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningService({})", hex::encode(self.keypair.public.to_bytes()))
    }
}

impl Signer for SigningService {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    fn public_key(&self) -> Result<PublicKeyBytes, CoreError> {
        Ok(PublicKeyBytes(self.keypair.public.to_bytes()))
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, CoreError> {
        Ok(Signature(self.keypair.sign(message).to_bytes()))
    }
}

/// Verifies `signature` over `message` for `public_key`.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CoreError> {
    match algorithm {
        SignatureAlgorithm::Ed25519 => {
            let key = PublicKey::from_bytes(&public_key.0)
                .map_err(|e| CoreError::Cryptographic(format!("invalid public key: {}", e)))?;
            let sig = ed25519_dalek::Signature::try_from(&signature.0[..])
                .map_err(|e| CoreError::Cryptographic(format!("malformed signature: {}", e)))?;
            key.verify(message, &sig).map_err(|e| {
                CoreError::Cryptographic(format!(
                    "signature does not verify for key {}: {}",
                    public_key.to_hex(),
                    e
                ))
            })
        }
    }
}
