//! Client-side signing key lifecycle
//!
//! A signing identity is an RSA-2048 key pair generated once and reused
//! across sessions. The server never sees the private component; only the
//! SPKI PEM export of the public key crosses the trust boundary alongside
//! each signed submission.

pub mod store;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

pub use store::{FileKeyStore, KeyStore, StoredKeyPair};

/// RSA modulus size for generated signing keys
pub const KEY_BITS: usize = 2048;

/// Key lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("stored key material is invalid: {0}")]
    InvalidMaterial(String),

    #[error("key store error: {0}")]
    Store(#[from] std::io::Error),
}

/// A loaded signing key pair plus its portable public export
#[derive(Debug)]
pub struct SigningIdentity {
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
    /// SPKI PEM export of the public key, sent with each submission
    pub public_key_pem: String,
}

impl SigningIdentity {
    /// Load the persisted identity, or generate and persist a new one.
    ///
    /// Repeated calls against the same store return byte-identical key
    /// material.
    pub fn get_or_create(store: &dyn KeyStore) -> Result<Self, KeyError> {
        if let Some(pair) = store.load()? {
            let private_key = RsaPrivateKey::from_pkcs8_pem(&pair.private_pem)
                .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;
            let public_key = RsaPublicKey::from_public_key_pem(&pair.public_pem)
                .map_err(|e| KeyError::InvalidMaterial(e.to_string()))?;

            return Ok(Self {
                private_key,
                public_key,
                public_key_pem: pair.public_pem,
            });
        }

        info!("No signing key pair found, generating RSA-{}", KEY_BITS);

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        store.save(&StoredKeyPair {
            private_pem: private_pem.to_string(),
            public_pem: public_key_pem.clone(),
        })?;

        info!("Signing key pair generated and persisted");

        Ok(Self {
            private_key,
            public_key,
            public_key_pem,
        })
    }
}
