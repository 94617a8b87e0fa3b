//! Checksum computation for the tus checksum extension.
//!
//! Provides the algorithms a store can advertise in `Tus-Checksum-Algorithm`
//! and the functions used to hash a received chunk. Algorithm names are the
//! lowercase forms used on the wire (`md5`, `sha1`, `sha256`).
//!
//! # Streaming Hashing
//!
//! Stores that never hold a whole chunk in memory can feed data into a
//! [`ChunkHasher`] while copying and compare the result afterwards.

use std::fmt;
use std::str::FromStr;

use digest::Digest;

// ---------------------------------------------------------------------------
// ChecksumAlgorithm
// ---------------------------------------------------------------------------

/// Checksum algorithms understood by the engine's reference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// MD5.
    Md5,
    /// SHA-1. This is the algorithm every tus server must support.
    Sha1,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    /// All algorithms, in the order they are advertised.
    pub const ALL: [Self; 3] = [Self::Sha1, Self::Sha256, Self::Md5];

    /// Return the name used in tus headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Length of a digest produced by this algorithm, in bytes.
    #[must_use]
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`ChecksumAlgorithm`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown checksum algorithm: {0}")]
pub struct ParseChecksumAlgorithmError(String);

impl FromStr for ChecksumAlgorithm {
    type Err = ParseChecksumAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(ParseChecksumAlgorithmError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Standalone checksum functions
// ---------------------------------------------------------------------------

/// Compute the raw digest of `data` with the given algorithm.
///
/// # Examples
///
/// ```
/// use tuskit_core::checksums::{ChecksumAlgorithm, compute_checksum};
///
/// let digest = compute_checksum(ChecksumAlgorithm::Sha1, b"hello");
/// assert_eq!(digest.len(), 20);
/// ```
#[must_use]
pub fn compute_checksum(algorithm: ChecksumAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        ChecksumAlgorithm::Md5 => md5::Md5::digest(data).to_vec(),
        ChecksumAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
        ChecksumAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
    }
}

/// Whether `data` hashes to `expected` under `algorithm`.
#[must_use]
pub fn matches_checksum(algorithm: ChecksumAlgorithm, data: &[u8], expected: &[u8]) -> bool {
    expected.len() == algorithm.digest_len() && compute_checksum(algorithm, data) == expected
}

// ---------------------------------------------------------------------------
// ChunkHasher
// ---------------------------------------------------------------------------

/// Incremental hasher over one chunk of upload data.
///
/// # Examples
///
/// ```
/// use tuskit_core::checksums::{ChecksumAlgorithm, ChunkHasher, compute_checksum};
///
/// let mut hasher = ChunkHasher::new(ChecksumAlgorithm::Sha256);
/// hasher.update(b"hello ");
/// hasher.update(b"world");
/// assert_eq!(hasher.finish(), compute_checksum(ChecksumAlgorithm::Sha256, b"hello world"));
/// ```
#[derive(Debug, Clone)]
pub enum ChunkHasher {
    /// MD5 state.
    Md5(md5::Md5),
    /// SHA-1 state.
    Sha1(sha1::Sha1),
    /// SHA-256 state.
    Sha256(sha2::Sha256),
}

impl ChunkHasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Self::Md5(<md5::Md5 as Digest>::new()),
            ChecksumAlgorithm::Sha1 => Self::Sha1(<sha1::Sha1 as Digest>::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(<sha2::Sha256 as Digest>::new()),
        }
    }

    /// Feed more data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => Digest::update(h, data),
            Self::Sha1(h) => Digest::update(h, data),
            Self::Sha256(h) => Digest::update(h, data),
        }
    }

    /// Finalize the hasher and return the raw digest.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        match self {
            Self::Md5(h) => Digest::finalize(h).to_vec(),
            Self::Sha1(h) => Digest::finalize(h).to_vec(),
            Self::Sha256(h) => Digest::finalize(h).to_vec(),
        }
    }
}
