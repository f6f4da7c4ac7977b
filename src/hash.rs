// src/hash.rs

//! Checksums for metadata and package integrity
//!
//! Repositories declare checksums for everything they serve; this module
//! computes and verifies them. SHA-256 and SHA-512 cover the formats
//! current repositories emit.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Buffer size for streaming file hashing (64 KB)
const HASH_BUFFER_SIZE: usize = 65536;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    #[default]
    Sha256,
    Sha512,
}

impl ChecksumKind {
    /// Algorithm name as it appears in repository metadata
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Hex digest length for this algorithm
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ChecksumKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            other => Err(Error::Parse(format!("unknown checksum kind '{}'", other))),
        }
    }
}

/// An algorithm-tagged hex digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Checksum {
    pub kind: ChecksumKind,
    pub digest: String,
}

impl Checksum {
    /// Build a checksum, normalizing the digest to lowercase hex
    pub fn new(kind: ChecksumKind, digest: impl Into<String>) -> Result<Self> {
        let digest: String = digest.into().to_lowercase();
        if digest.len() != kind.hex_len() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Parse(format!(
                "invalid {} digest '{}'",
                kind.name(),
                digest
            )));
        }
        Ok(Self { kind, digest })
    }

    /// Compute the checksum of a byte slice
    pub fn of_bytes(kind: ChecksumKind, data: &[u8]) -> Self {
        let digest = match kind {
            ChecksumKind::Sha256 => hex::encode(Sha256::digest(data)),
            ChecksumKind::Sha512 => hex::encode(Sha512::digest(data)),
        };
        Self { kind, digest }
    }

    /// Compute the checksum of a file, streaming its contents
    pub fn of_file(kind: ChecksumKind, path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("opening {} for hashing", path.display()), e))?;
        let mut reader = BufReader::new(file);
        let mut buffer = [0u8; HASH_BUFFER_SIZE];

        let digest = match kind {
            ChecksumKind::Sha256 => {
                let mut hasher = Sha256::new();
                stream_into(&mut reader, &mut buffer, |chunk| hasher.update(chunk), path)?;
                hex::encode(hasher.finalize())
            }
            ChecksumKind::Sha512 => {
                let mut hasher = Sha512::new();
                stream_into(&mut reader, &mut buffer, |chunk| hasher.update(chunk), path)?;
                hex::encode(hasher.finalize())
            }
        };

        Ok(Self { kind, digest })
    }

    /// Verify that a file matches this checksum
    ///
    /// Returns `ChecksumMismatch` carrying both digests on failure.
    pub fn verify_file(&self, path: &Path) -> Result<()> {
        let actual = Checksum::of_file(self.kind, path)?;
        if actual.digest != self.digest {
            return Err(Error::ChecksumMismatch {
                expected: self.digest.clone(),
                actual: actual.digest,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.digest)
    }
}

fn stream_into(
    reader: &mut impl Read,
    buffer: &mut [u8],
    mut update: impl FnMut(&[u8]),
    path: &Path,
) -> Result<()> {
    loop {
        let n = reader
            .read(buffer)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            return Ok(());
        }
        update(&buffer[..n]);
    }
}
