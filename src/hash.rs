// src/hash.rs

//! Content hashing for migration-directory integrity checking.
//!
//! Only SHA-256 is needed here -- the sum-file format (§4.F) is fixed to
//! base64-encoded SHA-256 digests, matching what `atlas migrate hash`
//! produces. Everything is built around an incremental [`Hasher`] so a
//! directory's whole-contents hash can be folded from its per-file hashes
//! without re-reading anything from disk.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};

/// A SHA-256 digest, always rendered as standard base64 (the sum-file
/// format never uses hex).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Hash(String);

impl Hash {
    fn from_digest(bytes: [u8; 32]) -> Self {
        Self(BASE64.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a base64-encoded digest as it appears in a sum file. Returns
    /// `None` on malformed input -- callers treat that as `IntegrityError`.
    pub fn parse(s: &str) -> Option<Self> {
        let decoded = BASE64.decode(s).ok()?;
        if decoded.len() != 32 {
            return None;
        }
        Some(Self(s.to_string()))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental SHA-256 hasher. Kept as its own type (rather than reaching
/// for `sha2::Sha256` directly everywhere) so the one conversion to
/// base64 lives in a single place.
pub struct Hasher(Sha256);

impl Hasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash::from_digest(self.0.finalize().into())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<Hash> {
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}
