//! Engine configuration.
//!
//! Provides [`TusConfig`] for configuring a [`TusProtocol`](crate::runner::TusProtocol).
//! Values can be built in code with the typed builder or loaded from
//! environment variables via [`TusConfig::from_env`].

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::helpers::expiration::ExpirationPolicy;
use crate::parsers::MetadataParsingStrategy;
use crate::store::capabilities::{TusExtensions, extension_names};

/// Default base path uploads are served under.
pub const DEFAULT_URL_PATH: &str = "/files";

/// tus engine configuration.
///
/// # Examples
///
/// ```
/// use tuskit_core::config::TusConfig;
/// use tuskit_core::store::TusExtensions;
///
/// let config = TusConfig::default();
/// assert_eq!(config.url_path, "/files");
/// assert_eq!(config.allowed_extensions, TusExtensions::all());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TusConfig {
    /// Base path uploads live under. Upload URLs are `{url_path}/{id}`.
    #[builder(default = String::from(DEFAULT_URL_PATH), setter(into))]
    pub url_path: String,

    /// Largest upload the server accepts, advertised as `Tus-Max-Size`.
    #[builder(default, setter(strip_option))]
    pub max_allowed_upload_size: Option<u64>,

    /// Upload expiration policy. `None` disables expiration.
    #[builder(default, setter(strip_option))]
    pub expiration: Option<ExpirationPolicy>,

    /// How `Upload-Metadata` is parsed.
    #[builder(default)]
    pub metadata_parsing_strategy: MetadataParsingStrategy,

    /// Extensions the engine may use, intersected with what the store supports.
    #[builder(default = TusExtensions::all())]
    #[serde(with = "extension_names")]
    pub allowed_extensions: TusExtensions,

    /// Hand the body to the store as a chunk stream when it supports it.
    #[builder(default = false)]
    pub prefer_pipelines: bool,
}

impl Default for TusConfig {
    fn default() -> Self {
        Self {
            url_path: String::from(DEFAULT_URL_PATH),
            max_allowed_upload_size: None,
            expiration: None,
            metadata_parsing_strategy: MetadataParsingStrategy::Original,
            allowed_extensions: TusExtensions::all(),
            prefer_pipelines: false,
        }
    }
}

impl TusConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default | Format |
    /// |----------|---------|--------|
    /// | `TUS_URL_PATH` | `/files` | path |
    /// | `TUS_MAX_UPLOAD_SIZE` | unset | bytes |
    /// | `TUS_EXPIRATION` | unset | `absolute:<secs>` or `sliding:<secs>` |
    /// | `TUS_METADATA_STRATEGY` | `original` | `original` or `allowEmptyValues` |
    /// | `TUS_EXTENSIONS` | all | comma-separated extension names |
    /// | `TUS_PREFER_PIPELINES` | `false` | bool |
    ///
    /// Values that do not parse are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuskit_core::config::TusConfig;
    ///
    /// let config = TusConfig::from_env();
    /// assert!(!config.url_path.is_empty());
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = var("TUS_URL_PATH") {
            config.url_path = v;
        }
        if let Some(v) = var("TUS_MAX_UPLOAD_SIZE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                config.max_allowed_upload_size = Some(n);
            }
        }
        if let Some(v) = var("TUS_EXPIRATION") {
            if let Ok(policy) = v.parse::<ExpirationPolicy>() {
                config.expiration = Some(policy);
            }
        }
        if let Some(v) = var("TUS_METADATA_STRATEGY") {
            if let Some(strategy) = parse_metadata_strategy(&v) {
                config.metadata_parsing_strategy = strategy;
            }
        }
        if let Some(v) = var("TUS_EXTENSIONS") {
            if let Ok(extensions) = TusExtensions::from_names(v.split(',')) {
                config.allowed_extensions = extensions;
            }
        }
        if let Some(v) = var("TUS_PREFER_PIPELINES") {
            config.prefer_pipelines = parse_bool(&v);
        }

        config
    }
}

fn parse_metadata_strategy(value: &str) -> Option<MetadataParsingStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "original" => Some(MetadataParsingStrategy::Original),
        "allowemptyvalues" | "allow-empty-values" => {
            Some(MetadataParsingStrategy::AllowEmptyValues)
        }
        _ => None,
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
