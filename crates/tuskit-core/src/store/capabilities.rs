//! Store capability negotiation.
//!
//! [`StoreAdapter`] wraps a bound store, probes its role accessors once and
//! intersects the result with the configured allow-list. Every other part of
//! the engine asks the adapter (never the raw store) whether an extension is
//! available, and goes through the adapter's typed accessors to use it.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use tracing::debug;

use super::{
    ChecksumStore, ConcatenationStore, CreationDeferLengthStore, CreationStore, ExpirationStore,
    PipelineStore, ReadableStore, TerminationStore, TusStore,
};
use crate::error::{TusError, TusResult};

bitflags! {
    /// tus protocol extensions.
    pub struct TusExtensions: u16 {
        /// `creation`
        const CREATION = 1 << 0;
        /// `creation-with-upload`
        const CREATION_WITH_UPLOAD = 1 << 1;
        /// `termination`
        const TERMINATION = 1 << 2;
        /// `checksum`
        const CHECKSUM = 1 << 3;
        /// `checksum-trailer`
        const CHECKSUM_TRAILER = 1 << 4;
        /// `concatenation`
        const CONCATENATION = 1 << 5;
        /// `creation-defer-length`
        const CREATION_DEFER_LENGTH = 1 << 6;
        /// `expiration`
        const EXPIRATION = 1 << 7;
    }
}

bitflags! {
    /// Store features that are not advertised as tus extensions.
    pub struct StoreFeatures: u8 {
        /// The store can hand uploads back through [`ReadableStore`].
        const READABLE = 1 << 0;
        /// The store accepts chunk streams through [`PipelineStore`].
        const STREAMING_PIPELINE = 1 << 1;
    }
}

const EXTENSION_NAMES: [(TusExtensions, &str); 8] = [
    (TusExtensions::CREATION, "creation"),
    (TusExtensions::CREATION_WITH_UPLOAD, "creation-with-upload"),
    (TusExtensions::TERMINATION, "termination"),
    (TusExtensions::CHECKSUM, "checksum"),
    (TusExtensions::CHECKSUM_TRAILER, "checksum-trailer"),
    (TusExtensions::CONCATENATION, "concatenation"),
    (TusExtensions::CREATION_DEFER_LENGTH, "creation-defer-length"),
    (TusExtensions::EXPIRATION, "expiration"),
];

/// Error returned for an unknown extension name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tus extension: {0}")]
pub struct ParseExtensionError(String);

impl TusExtensions {
    /// Wire names of the set flags, in canonical order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        EXTENSION_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Format as a `Tus-Extension` header value.
    #[must_use]
    pub fn to_header_value(self) -> String {
        self.names().join(",")
    }

    /// Parse a list of wire names. Names are trimmed and compared ignoring
    /// case; empty entries are skipped.
    pub fn from_names<'a>(
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ParseExtensionError> {
        let mut extensions = Self::empty();
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let flag = EXTENSION_NAMES
                .iter()
                .find(|(_, known)| known.eq_ignore_ascii_case(name))
                .map(|(flag, _)| *flag)
                .ok_or_else(|| ParseExtensionError(name.to_owned()))?;
            extensions.insert(flag);
        }
        Ok(extensions)
    }
}

impl Default for TusExtensions {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for TusExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Serde helpers that write [`TusExtensions`] as a list of wire names.
pub mod extension_names {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TusExtensions;

    /// Serialize as a list of names.
    pub fn serialize<S: Serializer>(
        extensions: &TusExtensions,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(extensions.names())
    }

    /// Deserialize from a list of names.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<TusExtensions, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        TusExtensions::from_names(names.iter().map(String::as_str)).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// StoreAdapter
// ---------------------------------------------------------------------------

/// A bound store plus the extensions it may be used for.
pub struct StoreAdapter {
    store: Arc<dyn TusStore>,
    extensions: TusExtensions,
    features: StoreFeatures,
}

impl fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("store", &self.store)
            .field("extensions", &self.extensions.to_header_value())
            .field("features", &self.features)
            .finish()
    }
}

impl StoreAdapter {
    /// Probe `store` and keep only the extensions in `allowed`.
    #[must_use]
    pub fn new(store: Arc<dyn TusStore>, allowed: TusExtensions) -> Self {
        let mut extensions = TusExtensions::empty();
        extensions.set(TusExtensions::CREATION, store.creation().is_some());
        extensions.set(
            TusExtensions::CREATION_WITH_UPLOAD,
            store.creation().is_some(),
        );
        extensions.set(TusExtensions::TERMINATION, store.termination().is_some());
        extensions.set(TusExtensions::CHECKSUM, store.checksum().is_some());
        extensions.set(TusExtensions::CHECKSUM_TRAILER, store.checksum().is_some());
        extensions.set(TusExtensions::CONCATENATION, store.concatenation().is_some());
        extensions.set(
            TusExtensions::CREATION_DEFER_LENGTH,
            store.creation_defer_length().is_some(),
        );
        extensions.set(TusExtensions::EXPIRATION, store.expiration().is_some());

        let mut features = StoreFeatures::empty();
        features.set(StoreFeatures::READABLE, store.readable().is_some());
        features.set(StoreFeatures::STREAMING_PIPELINE, store.pipeline().is_some());

        let extensions = extensions & allowed;
        debug!(
            extensions = %extensions,
            features = ?features,
            "bound tus store"
        );

        Self {
            store,
            extensions,
            features,
        }
    }

    /// Extensions the store supports and configuration allows.
    #[must_use]
    pub fn extensions(&self) -> TusExtensions {
        self.extensions
    }

    /// Non-extension features of the store.
    #[must_use]
    pub fn features(&self) -> StoreFeatures {
        self.features
    }

    /// Whether every flag in `extension` is available.
    #[must_use]
    pub fn supports(&self, extension: TusExtensions) -> bool {
        self.extensions.contains(extension)
    }

    /// Whether every flag in `feature` is available.
    #[must_use]
    pub fn has_feature(&self, feature: StoreFeatures) -> bool {
        self.features.contains(feature)
    }

    /// The core store contract.
    #[must_use]
    pub fn core(&self) -> &dyn TusStore {
        self.store.as_ref()
    }

    /// The bound store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TusStore> {
        &self.store
    }

    /// The creation role.
    pub fn creation(&self) -> TusResult<&dyn CreationStore> {
        self.role(TusExtensions::CREATION, "creation", self.store.creation())
    }

    /// The termination role.
    pub fn termination(&self) -> TusResult<&dyn TerminationStore> {
        self.role(
            TusExtensions::TERMINATION,
            "termination",
            self.store.termination(),
        )
    }

    /// The checksum role.
    pub fn checksum(&self) -> TusResult<&dyn ChecksumStore> {
        self.role(TusExtensions::CHECKSUM, "checksum", self.store.checksum())
    }

    /// The concatenation role.
    pub fn concatenation(&self) -> TusResult<&dyn ConcatenationStore> {
        self.role(
            TusExtensions::CONCATENATION,
            "concatenation",
            self.store.concatenation(),
        )
    }

    /// The creation-defer-length role.
    pub fn creation_defer_length(&self) -> TusResult<&dyn CreationDeferLengthStore> {
        self.role(
            TusExtensions::CREATION_DEFER_LENGTH,
            "creation-defer-length",
            self.store.creation_defer_length(),
        )
    }

    /// The expiration role.
    pub fn expiration(&self) -> TusResult<&dyn ExpirationStore> {
        self.role(
            TusExtensions::EXPIRATION,
            "expiration",
            self.store.expiration(),
        )
    }

    /// The readable role.
    pub fn readable(&self) -> TusResult<&dyn ReadableStore> {
        if !self.has_feature(StoreFeatures::READABLE) {
            return Err(TusError::NotSupported { role: "readable" });
        }
        self.store
            .readable()
            .ok_or(TusError::NotSupported { role: "readable" })
    }

    /// The streaming pipeline role.
    pub fn pipeline(&self) -> TusResult<&dyn PipelineStore> {
        if !self.has_feature(StoreFeatures::STREAMING_PIPELINE) {
            return Err(TusError::NotSupported { role: "pipeline" });
        }
        self.store
            .pipeline()
            .ok_or(TusError::NotSupported { role: "pipeline" })
    }

    fn role<'a, R: ?Sized>(
        &self,
        extension: TusExtensions,
        role: &'static str,
        accessor: Option<&'a R>,
    ) -> TusResult<&'a R> {
        if !self.supports(extension) {
            return Err(TusError::NotSupported { role });
        }
        accessor.ok_or(TusError::NotSupported { role })
    }
}
