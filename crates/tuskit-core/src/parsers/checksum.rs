//! `Upload-Checksum` parsing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

const SENTINEL_ALGORITHM: &str = "sha1";
const SENTINEL_HASH: [u8; 20] = [0; 20];

/// A parsed `Upload-Checksum` value: `<algorithm> <base64 hash>`.
///
/// Parsing never fails outright; an unparsable header yields a checksum with
/// [`is_valid`](Self::is_valid) set to `false` so callers can decide which
/// response (or fallback) applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: String,
    hash: Vec<u8>,
    is_valid: bool,
}

impl Checksum {
    /// Parse a header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuskit_core::parsers::checksum::Checksum;
    ///
    /// let checksum = Checksum::parse("sha1 qvTGHdzF6KLavt4PO0gs2a6pQ00=");
    /// assert!(checksum.is_valid());
    /// assert_eq!(checksum.algorithm(), "sha1");
    /// assert!(!Checksum::parse("sha1").is_valid());
    /// ```
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut parts = header.trim().split(' ');
        let (Some(algorithm), Some(encoded), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Self::invalid();
        };
        if algorithm.is_empty() {
            return Self::invalid();
        }

        match BASE64_STANDARD.decode(encoded) {
            Ok(hash) if !hash.is_empty() => Self {
                algorithm: algorithm.to_ascii_lowercase(),
                hash,
                is_valid: true,
            },
            _ => Self::invalid(),
        }
    }

    /// The checksum sent to the store in place of a declared trailer that
    /// could not be read: SHA-1 with an all-zero hash. It can never match real
    /// data, so the store discards the chunk.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            algorithm: SENTINEL_ALGORITHM.to_owned(),
            hash: SENTINEL_HASH.to_vec(),
            is_valid: true,
        }
    }

    fn invalid() -> Self {
        Self {
            algorithm: String::new(),
            hash: Vec::new(),
            is_valid: false,
        }
    }

    /// Lowercase algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw decoded hash.
    #[must_use]
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Whether the header parsed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Whether this is the [`sentinel`](Self::sentinel) checksum.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.algorithm == SENTINEL_ALGORITHM && self.hash == SENTINEL_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_algorithm_and_hash() {
        let checksum = Checksum::parse("SHA256 AAEC");
        assert!(checksum.is_valid());
        assert_eq!(checksum.algorithm(), "sha256");
        assert_eq!(checksum.hash(), &[0, 1, 2]);
    }

    #[test]
    fn test_should_reject_missing_hash() {
        assert!(!Checksum::parse("sha1").is_valid());
        assert!(!Checksum::parse("").is_valid());
    }

    #[test]
    fn test_should_reject_extra_parts() {
        assert!(!Checksum::parse("sha1 AAEC AAEC").is_valid());
    }

    #[test]
    fn test_should_reject_invalid_base64() {
        assert!(!Checksum::parse("sha1 ***").is_valid());
    }

    #[test]
    fn test_should_build_sentinel() {
        let sentinel = Checksum::sentinel();
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.algorithm(), "sha1");
        assert_eq!(sentinel.hash().len(), 20);
        assert!(!Checksum::parse("sha1 AAEC").is_sentinel());
    }
}
