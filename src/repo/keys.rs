// src/repo/keys.rs

//! OpenPGP key handling and metadata signature verification
//!
//! Repository metadata may ship with a detached signature. Keys are
//! imported per repository into a keyring directory; a key encountered
//! for the first time is offered to `RepoCallbacks::repokey_import`
//! before it is accepted.

use crate::error::{Error, Result};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use sequoia_openpgp as openpgp;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-repository OpenPGP keyring and signature verifier
pub struct KeyRing {
    /// Directory holding one `<repo_id>.asc` per repository
    keyring_dir: PathBuf,
    policy: StandardPolicy<'static>,
}

impl KeyRing {
    /// Open (creating if needed) a keyring directory
    pub fn new(keyring_dir: PathBuf) -> Result<Self> {
        if !keyring_dir.exists() {
            fs::create_dir_all(&keyring_dir)
                .map_err(|e| Error::io("creating keyring directory".to_string(), e))?;
        }

        Ok(Self {
            keyring_dir,
            policy: StandardPolicy::new(),
        })
    }

    fn key_path(&self, repo_id: &str) -> PathBuf {
        self.keyring_dir.join(format!("{}.asc", repo_id))
    }

    /// Whether a key has been imported for this repository
    pub fn has_key(&self, repo_id: &str) -> bool {
        self.key_path(repo_id).exists()
    }

    /// Fingerprint of the key that `import_key` would store
    pub fn fingerprint_of(key_data: &[u8]) -> Result<String> {
        let cert = openpgp::Cert::from_bytes(key_data)
            .map_err(|e| Error::Parse(format!("failed to parse OpenPGP key: {e}")))?;
        Ok(cert.fingerprint().to_string())
    }

    /// Import a public key for a repository, returning its fingerprint
    pub fn import_key(&self, key_data: &[u8], repo_id: &str) -> Result<String> {
        let fingerprint = Self::fingerprint_of(key_data)?;
        debug!("Importing key {} for repository '{}'", fingerprint, repo_id);

        fs::write(self.key_path(repo_id), key_data)
            .map_err(|e| Error::io("writing repository key".to_string(), e))?;

        info!("Imported key for repository '{}' (fingerprint: {})", repo_id, fingerprint);
        Ok(fingerprint)
    }

    /// Verify a detached signature over a file with the repository's key
    pub fn verify_detached(
        &self,
        file_path: &Path,
        signature_path: &Path,
        repo_id: &str,
    ) -> Result<()> {
        let key_path = self.key_path(repo_id);
        if !key_path.exists() {
            return Err(Error::NotFound(format!(
                "no key imported for repository '{}'",
                repo_id
            )));
        }

        let key_data = fs::read(&key_path)
            .map_err(|e| Error::io("reading repository key".to_string(), e))?;
        let cert = openpgp::Cert::from_bytes(&key_data)
            .map_err(|e| Error::Parse(format!("failed to parse repository key: {e}")))?;

        let message_data = fs::read(file_path)
            .map_err(|e| Error::io("reading file to verify".to_string(), e))?;
        let signature_data = fs::read(signature_path)
            .map_err(|e| Error::io("reading signature file".to_string(), e))?;

        use openpgp::PacketPile;
        let pile = PacketPile::from_bytes(&signature_data)
            .map_err(|e| Error::Parse(format!("failed to parse signature: {e}")))?;

        let mut verified = false;
        'outer: for packet in pile.descendants() {
            if let openpgp::Packet::Signature(sig) = packet {
                for key in cert.keys().with_policy(&self.policy, None) {
                    if key.for_signing() && sig.verify_message(key.key(), &message_data).is_ok() {
                        verified = true;
                        break 'outer;
                    }
                }
            }
        }

        if !verified {
            return Err(Error::RepoPgp {
                repo_id: repo_id.to_string(),
                message: "no valid signature found".to_string(),
                source: None,
            });
        }

        debug!("Verified signature over {}", file_path.display());
        Ok(())
    }
}
