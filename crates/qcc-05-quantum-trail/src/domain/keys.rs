//! The ledger's Ed25519 signing identity.
//!
//! One keypair per ledger instance signs every transaction body; the
//! verifying half is what chain validation checks against. The seed is
//! persisted next to the chain so records stay verifiable across restarts.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// The ledger signer.
pub struct TrailSigner {
    signing: SigningKey,
}

impl TrailSigner {
    /// Fresh random identity.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild from a persisted 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn seed(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign a canonical body, hex-encoded.
    pub fn sign(&self, body: &[u8]) -> String {
        hex::encode(self.signing.sign(body).to_bytes())
    }
}

/// Verify a hex-encoded signature against a body.
pub fn verify(verifying_key: &VerifyingKey, body: &[u8], signature_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    verifying_key.verify(body, &signature).is_ok()
}
