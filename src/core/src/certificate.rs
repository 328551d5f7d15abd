//! Certificates over the commitment tree root and the trust anchor that checks them.

use crate::encoding::CanonicalEncoder;
use crate::errors::CoreError;
use crate::hash::DataHash;
use crate::signing::{verify_signature, Signer};
use crate::types::{PublicKeyBytes, Signature, SignatureAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const CERTIFICATE_DOMAIN: &str = "UNICITY_CERT";

/// One validator's endorsement of a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSignature {
    pub validator: PublicKeyBytes,
    pub signature: Signature,
}

/// A quorum-signed statement that `root` was the tree root at `round`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnicityCertificate {
    pub root: DataHash,
    pub round: u64,
    pub signatures: Vec<CertificateSignature>,
}

impl UnicityCertificate {
    /// Bytes each validator signs.
    pub fn signing_message(root: &DataHash, round: u64) -> Result<Vec<u8>, CoreError> {
        let mut enc = CanonicalEncoder::new();
        enc.array(3)?.text(CERTIFICATE_DOMAIN)?.hash(root)?.u64(round);
        Ok(enc.finish())
    }

    /// Issues a certificate signed by every validator in `validators`.
    pub fn sign<S: Signer>(root: DataHash, round: u64, validators: &[S]) -> Result<Self, CoreError> {
        let message = Self::signing_message(&root, round)?;
        let signatures = validators
            .iter()
            .map(|v| {
                Ok(CertificateSignature {
                    validator: v.public_key()?,
                    signature: v.sign(&message)?,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Ok(Self {
            root,
            round,
            signatures,
        })
    }
}

/// The validator set a verifier trusts, and how many of them must agree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTrustAnchor")]
pub struct TrustAnchor {
    validators: Vec<PublicKeyBytes>,
    quorum: usize,
}

#[derive(Deserialize)]
struct RawTrustAnchor {
    validators: Vec<PublicKeyBytes>,
    quorum: usize,
}

impl TryFrom<RawTrustAnchor> for TrustAnchor {
    type Error = CoreError;

    fn try_from(raw: RawTrustAnchor) -> Result<Self, Self::Error> {
        TrustAnchor::new(raw.validators, raw.quorum)
    }
}

impl TrustAnchor {
    /// Creates an anchor; the quorum must be between 1 and the validator count.
    pub fn new(validators: Vec<PublicKeyBytes>, quorum: usize) -> Result<Self, CoreError> {
        if quorum == 0 || quorum > validators.len() {
            return Err(CoreError::invalid_field(
                "quorum",
                format!("{} is outside 1..={}", quorum, validators.len()),
            ));
        }
        Ok(Self { validators, quorum })
    }

    pub fn validators(&self) -> &[PublicKeyBytes] {
        &self.validators
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Checks that `certificate` endorses `root` with at least a quorum of
    /// distinct trusted validators.
    pub fn verify(&self, certificate: &UnicityCertificate, root: &DataHash) -> Result<(), CoreError> {
        if certificate.root != *root {
            return Err(CoreError::DigestMismatch {
                context: "certificate root".to_string(),
                expected: root.to_hex(),
                actual: certificate.root.to_hex(),
            });
        }

        let message = UnicityCertificate::signing_message(&certificate.root, certificate.round)?;
        let mut endorsed = HashSet::new();
        for entry in &certificate.signatures {
            if !self.validators.contains(&entry.validator) || endorsed.contains(&entry.validator) {
                continue;
            }
            if verify_signature(
                SignatureAlgorithm::Ed25519,
                &entry.validator,
                &message,
                &entry.signature,
            )
            .is_ok()
            {
                endorsed.insert(entry.validator);
            }
        }

        if endorsed.len() < self.quorum {
            return Err(CoreError::Cryptographic(format!(
                "certificate for round {} has {} valid trusted signatures, quorum is {}",
                certificate.round,
                endorsed.len(),
                self.quorum
            )));
        }
        Ok(())
    }
}
