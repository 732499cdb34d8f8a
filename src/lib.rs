//! sealgate: signature-gated ingestion and transformation service
//!
//! Pipeline: a client signs the SHA-256 digest of a binary with its
//! persistent RSA key pair and uploads file + signature + public key.
//! The server admits the payload through two independent gates (ELF
//! magic, RSA-PSS verification), runs the external transformation
//! program against it, and publishes the output artifact for download.

pub mod admission;
pub mod api;
pub mod config;
pub mod job;
pub mod keys;
pub mod signer;
pub mod storage;
pub mod verify;
