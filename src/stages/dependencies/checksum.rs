//! Content checksums for pinned sources and produced artifacts.

use crate::error::{ErrorExt, PipelineError, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// A pinned digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    /// SHA-256 (64 hex characters)
    Sha256(String),
    /// SHA-1 (40 hex characters)
    Sha1(String),
}

impl Checksum {
    /// Algorithm name
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Sha256(_) => "sha256",
            Self::Sha1(_) => "sha1",
        }
    }

    /// Expected hex digest
    pub fn expected(&self) -> &str {
        match self {
            Self::Sha256(hex) | Self::Sha1(hex) => hex,
        }
    }

    /// Reject digests with the wrong length or non-hex characters.
    pub fn validate_format(&self, package: &str) -> Result<()> {
        let expected_len = match self {
            Self::Sha256(_) => 64,
            Self::Sha1(_) => 40,
        };
        let digest = self.expected();
        if digest.len() != expected_len || hex::decode(digest).is_err() {
            return Err(PipelineError::Config(format!(
                "package `{package}` has an invalid {} digest `{digest}`",
                self.algorithm()
            )));
        }
        Ok(())
    }

    /// Digest of `data` with this checksum's algorithm.
    pub fn compute(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256(_) => hex::encode(Sha256::digest(data)),
            Self::Sha1(_) => hex::encode(Sha1::digest(data)),
        }
    }

    /// Check `data` against the pinned digest.
    pub fn verify(&self, package: &str, data: &[u8]) -> Result<()> {
        let actual = self.compute(data);
        if actual != self.expected() {
            return Err(PipelineError::ChecksumMismatch {
                name: package.to_string(),
                expected: self.expected().to_string(),
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm(), self.expected())
    }
}

/// SHA-256 of a file, read in 8KB chunks.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
