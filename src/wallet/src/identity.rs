//! A receiver's key and how it locks the tokens it is given.

use token_core::errors::CoreError;
use token_core::predicate::{Address, Predicate, PredicateKind};
use token_core::signing::{Signer, SigningService};
use token_core::types::{Salt, TokenId, TokenType};

/// A signer plus the predicate shape it receives tokens under.
///
/// Masked identities derive the mask from their own salt, so the address they
/// hand out is different for every token. Unmasked identities publish one
/// address; the state nonce comes from the sender's transaction salt.
#[derive(Debug)]
pub struct ReceiverIdentity {
    signer: SigningService,
    kind: PredicateKind,
    salt: Salt,
}

impl ReceiverIdentity {
    pub fn new(signer: SigningService, kind: PredicateKind, salt: Salt) -> Self {
        Self { signer, kind, salt }
    }

    /// A masked identity with a fresh random salt.
    pub fn masked(signer: SigningService) -> Self {
        Self::new(signer, PredicateKind::Masked, Salt::random())
    }

    pub fn unmasked(signer: SigningService) -> Self {
        Self::new(signer, PredicateKind::Unmasked, Salt::random())
    }

    pub fn signer(&self) -> &SigningService {
        &self.signer
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    /// The predicate locking `token_id` to this identity.
    ///
    /// `transaction_salt` is the salt of the mint or transfer that delivers the token.
    pub fn predicate_for(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        transaction_salt: &Salt,
    ) -> Result<Predicate, CoreError> {
        let salt = match self.kind {
            PredicateKind::Masked => &self.salt,
            PredicateKind::Unmasked => transaction_salt,
        };
        Predicate::for_signer(&self.signer, token_id, token_type, salt, self.kind)
    }

    /// The address a sender should target when delivering `token_id`.
    pub fn address_for(&self, token_id: &TokenId, token_type: &TokenType) -> Result<Address, CoreError> {
        // The nonce of an unmasked predicate is not part of its address.
        self.predicate_for(token_id, token_type, &self.salt)?.address()
    }

    pub fn owns(&self, predicate: &Predicate) -> Result<bool, CoreError> {
        Ok(predicate.is_owner(self.signer.algorithm(), &self.signer.public_key()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (TokenId, TokenType) {
        (TokenId([3; 32]), TokenType([4; 32]))
    }

    #[test]
    fn test_masked_address_is_per_token() {
        let identity = ReceiverIdentity::masked(SigningService::from_secret(b"bob", None).unwrap());
        let (token_id, token_type) = ids();
        let a = identity.address_for(&token_id, &token_type).unwrap();
        let b = identity.address_for(&TokenId([5; 32]), &token_type).unwrap();
        assert_ne!(a, b);

        let predicate = identity.predicate_for(&token_id, &token_type, &Salt([0; 32])).unwrap();
        assert!(predicate.satisfies(&a).unwrap());
        assert!(identity.owns(&predicate).unwrap());
    }

    #[test]
    fn test_unmasked_address_ignores_transaction_salt() {
        let identity = ReceiverIdentity::unmasked(SigningService::from_secret(b"bob", None).unwrap());
        let (token_id, token_type) = ids();
        let address = identity.address_for(&token_id, &token_type).unwrap();

        let p1 = identity.predicate_for(&token_id, &token_type, &Salt([1; 32])).unwrap();
        let p2 = identity.predicate_for(&token_id, &token_type, &Salt([2; 32])).unwrap();
        assert_ne!(p1, p2);
        assert!(p1.satisfies(&address).unwrap());
        assert!(p2.satisfies(&address).unwrap());
    }

    #[test]
    fn test_stranger_does_not_own() {
        let bob = ReceiverIdentity::masked(SigningService::from_secret(b"bob", None).unwrap());
        let carol = ReceiverIdentity::masked(SigningService::from_secret(b"carol", None).unwrap());
        let (token_id, token_type) = ids();
        let predicate = bob.predicate_for(&token_id, &token_type, &Salt([0; 32])).unwrap();
        assert!(!carol.owns(&predicate).unwrap());
    }
}
