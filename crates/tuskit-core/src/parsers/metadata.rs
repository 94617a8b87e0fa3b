//! `Upload-Metadata` parsing and formatting.
//!
//! The header is a comma-separated list of `key base64value` pairs. Keys are
//! unique (compared case-insensitively) and must not be empty. Whether a bare
//! key without a value is accepted depends on the
//! [`MetadataParsingStrategy`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::Utf8Error;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};

/// How strictly `Upload-Metadata` is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataParsingStrategy {
    /// Every key must carry a base64 value.
    #[default]
    Original,
    /// A key without a value decodes to an empty value.
    AllowEmptyValues,
}

/// Error returned when `Upload-Metadata` cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataParseError {
    /// A pair had an empty key.
    #[error("Header Upload-Metadata: Key must not be empty")]
    EmptyKey,
    /// A key had no value under the `Original` strategy.
    #[error("Header Upload-Metadata: Key {0} must have a value")]
    MissingValue(String),
    /// A pair contained more than one space.
    #[error("Header Upload-Metadata: Key and value must be separated by a single space")]
    MalformedPair,
    /// A value was not valid base64.
    #[error("Header Upload-Metadata: Value for {0} is not properly encoded using base64")]
    InvalidBase64(String),
    /// The same key appeared twice.
    #[error("Header Upload-Metadata: Duplicate keys are not allowed")]
    DuplicateKey,
}

/// A single decoded metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    bytes: Vec<u8>,
}

impl Metadata {
    /// Wrap already decoded bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The decoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The decoded bytes as UTF-8.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Whether the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parsed `Upload-Metadata`, keyed by the key as sent by the client.
///
/// Lookups ignore ASCII case, matching the uniqueness rule.
///
/// # Examples
///
/// ```
/// use tuskit_core::parsers::metadata::{MetadataParsingStrategy, parse_metadata};
///
/// let map = parse_metadata("filename d29ybGQ=", MetadataParsingStrategy::Original).unwrap();
/// assert_eq!(map.get("FileName").unwrap().as_str().unwrap(), "world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataMap {
    entries: BTreeMap<String, Metadata>,
}

impl MetadataMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Metadata> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Whether the key is present, ignoring ASCII case.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value. Returns `false` (and leaves the map untouched) if a key
    /// equal ignoring case already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Metadata) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metadata)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Format the map back into an `Upload-Metadata` header value.
    ///
    /// Empty values are written as a bare key, which only the
    /// [`MetadataParsingStrategy::AllowEmptyValues`] strategy reads back.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k} {}", BASE64_STANDARD.encode(v.as_bytes()))
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for MetadataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Parse an `Upload-Metadata` header value.
///
/// A blank header yields an empty map.
pub fn parse_metadata(
    header: &str,
    strategy: MetadataParsingStrategy,
) -> Result<MetadataMap, MetadataParseError> {
    let mut map = MetadataMap::new();
    if header.trim().is_empty() {
        return Ok(map);
    }

    for pair in header.split(',') {
        let pair = pair.trim();
        let mut parts = pair.split(' ');
        let key = parts.next().unwrap_or_default();
        let value = parts.next();
        if parts.next().is_some() {
            return Err(MetadataParseError::MalformedPair);
        }

        if key.is_empty() {
            return Err(MetadataParseError::EmptyKey);
        }

        let decoded = match (value, strategy) {
            (None | Some(""), MetadataParsingStrategy::AllowEmptyValues) => Metadata::default(),
            (None | Some(""), MetadataParsingStrategy::Original) => {
                return Err(MetadataParseError::MissingValue(key.to_owned()));
            }
            (Some(encoded), _) => BASE64_STANDARD
                .decode(encoded)
                .map(Metadata::new)
                .map_err(|_| MetadataParseError::InvalidBase64(key.to_owned()))?,
        };

        if !map.insert(key, decoded) {
            return Err(MetadataParseError::DuplicateKey);
        }
    }

    Ok(map)
}
