//! Upload and output storage
//!
//! The upload and output directories are a shared namespace only; every
//! job's filenames are unique by construction (millisecond timestamp,
//! random suffix, original name), so concurrent jobs never collide.

use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::config::StorageConfig;

/// Create the upload and output roots if absent
pub fn ensure_dirs(config: &StorageConfig) -> io::Result<()> {
    fs::create_dir_all(&config.upload_dir)?;
    fs::create_dir_all(&config.output_dir)?;
    Ok(())
}

/// Unique filename for an uploaded input: `<millis>-<random>-<original>`.
///
/// Only the final path component of the client-supplied name is kept.
pub fn unique_filename(original: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    format!("{}-{}-{}", millis, suffix, sanitize_filename(original))
}

/// Strip any path components from a client-supplied filename
pub fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| "upload.bin".to_string())
}

/// Owned temporary input file, removed when the owner is done with it.
///
/// Every exit path of a request, success or failure, drops the guard and
/// releases the input deterministically.
pub struct ScopedTempFile {
    path: PathBuf,
}

impl ScopedTempFile {
    /// Write content to `path` and take ownership of it
    pub fn create(path: PathBuf, content: &[u8]) -> io::Result<Self> {
        fs::write(&path, content)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "failed to remove temp input");
            }
        } else {
            debug!(path = %self.path.display(), "temp input removed");
        }
    }
}
