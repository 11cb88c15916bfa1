//! Ed25519 signatures for the admission handshake (spec §4.4): a candidate
//! controller proves possession of the private key behind its claimed
//! public key by signing a server-issued challenge nonce. Grounded on
//! `shared-crypto::signatures::{Ed25519KeyPair, Ed25519PublicKey}`, trimmed
//! to the verify-only surface C4 needs plus a keypair for tests.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Ed25519Error {
    #[error("public key is not a valid curve point")]
    InvalidPublicKey,
    #[error("signature is malformed")]
    InvalidSignature,
    #[error("signature does not verify against the given public key")]
    VerificationFailed,
}

/// Verify `signature` over `message` under `public_key` (32 bytes).
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), Ed25519Error> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| Ed25519Error::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| Ed25519Error::InvalidPublicKey)?;

    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Ed25519Error::InvalidSignature)?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| Ed25519Error::VerificationFailed)
}

/// Test/bootstrap-tooling keypair. Production candidates generate and hold
/// their own signing key; the NIB only ever stores the public half.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"challenge-nonce");
        assert!(verify(&keypair.public_key_bytes(), b"challenge-nonce", &signature).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"challenge-nonce");
        assert_eq!(
            verify(&keypair.public_key_bytes(), b"different-nonce", &signature),
            Err(Ed25519Error::VerificationFailed)
        );
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let signature = keypair.sign(b"challenge-nonce");
        assert_eq!(
            verify(&other.public_key_bytes(), b"challenge-nonce", &signature),
            Err(Ed25519Error::VerificationFailed)
        );
    }

    #[test]
    fn malformed_public_key_is_rejected() {
        let result = verify(&[0u8; 10], b"msg", &[0u8; 64]);
        assert_eq!(result, Err(Ed25519Error::InvalidPublicKey));
    }
}
