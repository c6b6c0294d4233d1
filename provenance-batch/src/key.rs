//! Ed25519 signing for transaction and batch headers.
//!
//! Keys travel as 64-hex seeds, public keys and signatures as
//! lowercase hex. All signing in the submission path goes through
//! [`Signer`] so there is a single surface to audit.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,
}

/// An Ed25519 keypair signing header bytes as hex.
pub struct Signer {
    signing: SigningKey,
}

impl Signer {
    /// Load a signer from a 64-hex private key.
    pub fn from_hex(private_key: &str) -> Result<Signer, KeyError> {
        let bytes = hex::decode(private_key)
            .map_err(|err| KeyError::InvalidPrivateKey(err.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidPrivateKey("expected 32 bytes".to_string()))?;
        Ok(Signer {
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// Generate a fresh random signer.
    pub fn generate() -> Signer {
        use rand::rngs::OsRng;
        Signer {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Lowercase-hex public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().to_bytes())
    }

    /// Sign bytes, returning the hex signature.
    pub fn sign_hex(&self, bytes: &[u8]) -> String {
        use ed25519_dalek::Signer as _;
        hex::encode(self.signing.sign(bytes).to_bytes())
    }
}

/// Verify a hex signature over bytes under a hex public key.
pub fn verify_hex(public_key: &str, bytes: &[u8], signature: &str) -> Result<(), KeyError> {
    use ed25519_dalek::Verifier;

    let key_bytes: [u8; 32] = hex::decode(public_key)
        .map_err(|_| KeyError::InvalidPublicKey)?
        .try_into()
        .map_err(|_| KeyError::InvalidPublicKey)?;
    let verifying = VerifyingKey::from_bytes(&key_bytes).map_err(|_| KeyError::InvalidPublicKey)?;

    let sig_bytes: [u8; 64] = hex::decode(signature)
        .map_err(|_| KeyError::InvalidSignature)?
        .try_into()
        .map_err(|_| KeyError::InvalidSignature)?;

    verifying
        .verify(bytes, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| KeyError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = Signer::generate();
        let signature = signer.sign_hex(b"header bytes");
        verify_hex(&signer.public_key_hex(), b"header bytes", &signature).unwrap();

        assert_eq!(
            verify_hex(&signer.public_key_hex(), b"other bytes", &signature),
            Err(KeyError::InvalidSignature)
        );
    }

    #[test]
    fn from_hex_is_deterministic() {
        let seed = "1111111111111111111111111111111111111111111111111111111111111111";
        let a = Signer::from_hex(seed).unwrap();
        let b = Signer::from_hex(seed).unwrap();
        assert_eq!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.public_key_hex().len(), 64);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(Signer::from_hex("abcd").is_err());
        assert!(Signer::from_hex("zz").is_err());
    }
}
