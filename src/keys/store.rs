//! Persistent storage for the client signing key pair
//!
//! The store is a trait so the backing can be swapped (OS keychain,
//! hardware token) without touching the signing flow. The default backing
//! is two fixed files in a keys directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Private key file name (PKCS#8 PEM)
pub const PRIVATE_KEY_FILE: &str = "signing.key";
/// Public key file name (SPKI PEM)
pub const PUBLIC_KEY_FILE: &str = "signing.pub";

/// Exported key material as persisted by a store
#[derive(Debug, Clone)]
pub struct StoredKeyPair {
    /// Private key, PKCS#8 PEM
    pub private_pem: String,
    /// Public key, SPKI PEM
    pub public_pem: String,
}

/// Durable storage for one signing key pair
pub trait KeyStore {
    /// Load the persisted key pair, if any
    fn load(&self) -> io::Result<Option<StoredKeyPair>>;

    /// Persist a key pair, replacing any existing material
    fn save(&self, pair: &StoredKeyPair) -> io::Result<()>;

    /// Remove all persisted key material
    fn clear(&self) -> io::Result<()>;
}

/// File-backed key store
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn private_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    fn public_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> io::Result<Option<StoredKeyPair>> {
        let private_path = self.private_path();
        let public_path = self.public_path();

        match (private_path.exists(), public_path.exists()) {
            (true, true) => Ok(Some(StoredKeyPair {
                private_pem: fs::read_to_string(&private_path)?,
                public_pem: fs::read_to_string(&public_path)?,
            })),
            (false, false) => Ok(None),
            _ => {
                // Half a key pair is unusable; treat as absent and regenerate
                warn!(dir = %self.dir.display(), "incomplete key pair on disk, ignoring");
                Ok(None)
            }
        }
    }

    fn save(&self, pair: &StoredKeyPair) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let private_path = self.private_path();
        fs::write(&private_path, &pair.private_pem)?;
        restrict_permissions(&private_path)?;

        fs::write(self.public_path(), &pair.public_pem)?;
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        for path in [self.private_path(), self.public_path()] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Owner-only access on the private key file
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
