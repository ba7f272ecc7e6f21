//! Content hashing for version identity
//!
//! A version is addressed by SHA-256 over its raw bytes and its
//! canonicalized preprocessing config. All digests are 64-character
//! lowercase hex strings.

use crate::canonical;
use crate::error::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// SHA-256 over a byte slice, hex encoded.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 over a file's contents, read in chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hex::encode(hasher.finalize());
    log::debug!("File hash for '{}': {digest}", path.display());
    Ok(digest)
}

/// SHA-256 over the canonical rendering of a config document.
///
/// Key order and incidental whitespace in the source document do not
/// affect the digest; any parameter change does.
pub fn hash_config(config: &Value) -> Result<String> {
    let canonical = canonical::canonical_json(config);
    let digest = hash_bytes(canonical.as_bytes());
    log::debug!("Config hash: {digest}");
    Ok(digest)
}

/// Combine a raw-data hash and a config hash into a version hash.
///
/// The join rule is load-bearing and fixed forever: the two lowercase
/// hex digests are concatenated raw-then-config with no separator and
/// the SHA-256 of those UTF-8 bytes is the version identity. Changing
/// this rule would invalidate every hash in every existing repository.
pub fn hash_version(raw_hash: &str, config_hash: &str) -> String {
    let mut combined = String::with_capacity(raw_hash.len() + config_hash.len());
    combined.push_str(raw_hash);
    combined.push_str(config_hash);
    let digest = hash_bytes(combined.as_bytes());
    log::debug!("Version hash: {digest} (raw={raw_hash}, config={config_hash})");
    digest
}

/// True if `s` looks like a full lowercase SHA-256 hex digest.
pub fn is_full_hash(s: &str) -> bool {
    s.len() == 64
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
