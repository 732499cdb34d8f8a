//! Format admission gate
//!
//! Rejects any payload that is not an ELF container before signature
//! verification or any expensive work runs. The magic check and the
//! signature check are independent gates; both must pass.

/// Canonical ELF magic prefix: 0x7f 'E' 'L' 'F'
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Admission failures, all rejected with HTTP 400
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("no file uploaded")]
    MissingFile,

    #[error("encryption type is required")]
    MissingKind,

    #[error("invalid encryption type: {0}")]
    InvalidKind(String),

    #[error("not an ELF binary, file starts with: {found}")]
    InvalidFormat {
        /// Hex dump of the offending prefix, for diagnostics
        found: String,
    },

    #[error("file size too large, maximum {max_bytes} bytes allowed")]
    TooLarge { max_bytes: usize },
}

/// Check that the payload starts with the ELF magic sequence.
///
/// Payloads shorter than the magic are rejected like any other mismatch.
pub fn check_elf_magic(bytes: &[u8]) -> Result<(), AdmissionError> {
    if bytes.len() >= ELF_MAGIC.len() && bytes[..ELF_MAGIC.len()] == ELF_MAGIC {
        return Ok(());
    }

    let prefix = &bytes[..bytes.len().min(ELF_MAGIC.len())];
    Err(AdmissionError::InvalidFormat {
        found: format_prefix(prefix),
    })
}

fn format_prefix(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "(empty)".to_string();
    }
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_elf_prefix() {
        assert!(check_elf_magic(b"\x7fELF\x02\x01\x01\x00").is_ok());
    }

    #[test]
    fn test_exact_magic_only() {
        assert!(check_elf_magic(b"\x7fELF").is_ok());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        // Windows PE image
        let err = check_elf_magic(b"MZ\x90\x00rest").unwrap_err();
        match err {
            AdmissionError::InvalidFormat { found } => {
                assert_eq!(found, "0x4d 0x5a 0x90 0x00");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_payload_rejected() {
        let err = check_elf_magic(b"\x7fEL").unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidFormat { .. }));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let err = check_elf_magic(b"").unwrap_err();
        match err {
            AdmissionError::InvalidFormat { found } => assert_eq!(found, "(empty)"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_text_payload_rejected() {
        assert!(check_elf_magic(b"hello world, plainly not a binary").is_err());
    }
}
