//! Client-side file signing
//!
//! A submission is signed by hashing the full file content with SHA-256
//! and signing that digest with RSA-PSS (SHA-256, 32-byte salt). Signing
//! the digest rather than the raw bytes bounds the RSA input and leaves
//! room for streaming the hash later; the server recomputes the digest
//! over the whole received file, so any divergence between what was hashed
//! here and what arrives there fails verification.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::{Pss, RsaPrivateKey};
use sha2::{Digest, Sha256};
use std::path::Path;

/// PSS salt length in bytes, shared by signing and verification
pub const PSS_SALT_LEN: usize = 32;

/// Signing errors
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("signing failed: {0}")]
    Crypto(#[from] rsa::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// SHA-256 digest over full content
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Sign a content digest, returning the signature as base64.
///
/// The digest is the signed message; PSS hashes it again internally, so
/// the scheme is PSS-SHA256 over the 32-byte digest.
pub fn sign_digest(private_key: &RsaPrivateKey, digest: &[u8; 32]) -> Result<String, SignError> {
    let prehash = Sha256::digest(digest);
    let signature = private_key.sign_with_rng(
        &mut rand::thread_rng(),
        Pss::new_with_salt::<Sha256>(PSS_SALT_LEN),
        &prehash,
    )?;
    Ok(BASE64.encode(signature))
}

/// Hash and sign a file on disk
pub fn sign_file(private_key: &RsaPrivateKey, path: &Path) -> Result<String, SignError> {
    let content = std::fs::read(path)?;
    let digest = hash_bytes(&content);
    sign_digest(private_key, &digest)
}
