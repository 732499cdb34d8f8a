//! Server-side signature verification
//!
//! Confirms that a supplied signature was produced by the private
//! counterpart of the supplied public key over the exact received bytes.
//! Every failure mode (bad PEM, bad base64, key mismatch, tampered
//! content) collapses to `false` so a broken credential can never be
//! confused with an unauthenticated-but-allowed submission.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pss, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::signer::{hash_bytes, PSS_SALT_LEN};

/// Outcome of the two admission gates for one submission
#[derive(Debug, Clone, Copy)]
pub struct ValidationVerdict {
    pub format_valid: bool,
    pub signature_present: bool,
    pub signature_valid: bool,
}

impl ValidationVerdict {
    /// A submission counts as authenticated only when every gate passed
    pub fn authenticated(&self) -> bool {
        self.format_valid && self.signature_present && self.signature_valid
    }
}

/// Verify an RSA-PSS signature over the received file content.
///
/// The signed message is the SHA-256 digest of the file, matching the
/// client's `sign_digest`.
pub fn verify_signature(public_key_pem: &str, signature_b64: &str, file_bytes: &[u8]) -> bool {
    let public_key = match RsaPublicKey::from_public_key_pem(public_key_pem.trim()) {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "public key PEM rejected");
            return false;
        }
    };

    let signature = match BASE64.decode(signature_b64.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "signature base64 rejected");
            return false;
        }
    };

    let digest = hash_bytes(file_bytes);
    let prehash = Sha256::digest(digest);

    public_key
        .verify(
            Pss::new_with_salt::<Sha256>(PSS_SALT_LEN),
            &prehash,
            &signature,
        )
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{hash_bytes, sign_digest};
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use std::sync::OnceLock;

    struct TestKey {
        private: RsaPrivateKey,
        public_pem: String,
    }

    fn test_key() -> &'static TestKey {
        static KEY: OnceLock<TestKey> = OnceLock::new();
        KEY.get_or_init(|| generate_key())
    }

    fn second_key() -> &'static TestKey {
        static KEY: OnceLock<TestKey> = OnceLock::new();
        KEY.get_or_init(|| generate_key())
    }

    fn generate_key() -> TestKey {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        TestKey {
            private,
            public_pem,
        }
    }

    #[test]
    fn test_verdict_requires_every_gate() {
        let all = ValidationVerdict {
            format_valid: true,
            signature_present: true,
            signature_valid: true,
        };
        assert!(all.authenticated());

        for verdict in [
            ValidationVerdict {
                format_valid: false,
                ..all
            },
            ValidationVerdict {
                signature_present: false,
                ..all
            },
            ValidationVerdict {
                signature_valid: false,
                ..all
            },
        ] {
            assert!(!verdict.authenticated());
        }
    }

    #[test]
    fn test_round_trip() {
        let key = test_key();
        let content = b"\x7fELF round trip content";

        let digest = hash_bytes(content);
        let signature = sign_digest(&key.private, &digest).unwrap();

        assert!(verify_signature(&key.public_pem, &signature, content));
    }

    #[test]
    fn test_tampered_content_fails() {
        let key = test_key();
        let content = b"\x7fELF original";

        let digest = hash_bytes(content);
        let signature = sign_digest(&key.private, &digest).unwrap();

        assert!(!verify_signature(
            &key.public_pem,
            &signature,
            b"\x7fELF tampered"
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let content = b"\x7fELF signed with key one";

        let digest = hash_bytes(content);
        let signature = sign_digest(&test_key().private, &digest).unwrap();

        assert!(!verify_signature(
            &second_key().public_pem,
            &signature,
            content
        ));
    }

    #[test]
    fn test_garbage_inputs_yield_false() {
        let key = test_key();
        let content = b"\x7fELF content";
        let digest = hash_bytes(content);
        let signature = sign_digest(&key.private, &digest).unwrap();

        // Broken PEM
        assert!(!verify_signature("not a pem", &signature, content));
        // Broken base64
        assert!(!verify_signature(&key.public_pem, "%%%not base64%%%", content));
        // Valid base64 that is not a signature
        assert!(!verify_signature(&key.public_pem, "aGVsbG8=", content));
    }

    #[test]
    fn test_signatures_are_probabilistic_but_both_verify() {
        let key = test_key();
        let content = b"\x7fELF salted";
        let digest = hash_bytes(content);

        let sig1 = sign_digest(&key.private, &digest).unwrap();
        let sig2 = sign_digest(&key.private, &digest).unwrap();

        // PSS salts every signature
        assert_ne!(sig1, sig2);
        assert!(verify_signature(&key.public_pem, &sig1, content));
        assert!(verify_signature(&key.public_pem, &sig2, content));
    }
}
