//! Upload expiration.
//!
//! With an [`ExpirationPolicy`] configured and a store that implements the
//! expiration role, every created upload is stamped with `now + timeout`.
//! A sliding policy re-stamps the upload on every write; an absolute policy
//! leaves the first stamp alone. Final uploads are never stamped.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancellation::CancellationSignal;
use crate::config::TusConfig;
use crate::error::{TusError, TusResult};
use crate::store::{StoreAdapter, TusExtensions};

/// How long uploads live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExpirationPolicy {
    /// Expire `timeout_secs` after creation.
    Absolute {
        /// Lifetime in seconds.
        timeout_secs: u64,
    },
    /// Expire `timeout_secs` after the last write.
    Sliding {
        /// Lifetime in seconds.
        timeout_secs: u64,
    },
}

impl ExpirationPolicy {
    /// The configured lifetime.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        match self {
            Self::Absolute { timeout_secs } | Self::Sliding { timeout_secs } => *timeout_secs,
        }
    }

    /// Whether writes extend the lifetime.
    #[must_use]
    pub fn is_sliding(&self) -> bool {
        matches!(self, Self::Sliding { .. })
    }

    /// Expiry for an upload touched at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> TusResult<DateTime<Utc>> {
        let secs = i64::try_from(self.timeout_secs())
            .map_err(|_| anyhow::anyhow!("expiration timeout is too large"))?;
        TimeDelta::try_seconds(secs)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| TusError::Internal(anyhow::anyhow!("expiration overflows the calendar")))
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute { timeout_secs } => write!(f, "absolute:{timeout_secs}"),
            Self::Sliding { timeout_secs } => write!(f, "sliding:{timeout_secs}"),
        }
    }
}

/// Error returned when an expiration policy string does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid expiration policy {0:?}, expected absolute:<secs> or sliding:<secs>")]
pub struct ParseExpirationPolicyError(String);

impl FromStr for ExpirationPolicy {
    type Err = ParseExpirationPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseExpirationPolicyError(s.to_owned());
        let (kind, secs) = s.trim().split_once(':').ok_or_else(err)?;
        let timeout_secs = secs.trim().parse::<u64>().map_err(|_| err())?;
        match kind.trim().to_ascii_lowercase().as_str() {
            "absolute" => Ok(Self::Absolute { timeout_secs }),
            "sliding" => Ok(Self::Sliding { timeout_secs }),
            _ => Err(err()),
        }
    }
}

/// Format an expiry the way `Upload-Expires` carries it (RFC 7231 date).
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tuskit_core::helpers::expiration::format_expiration;
///
/// let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
/// assert_eq!(format_expiration(at), "Sun, 06 Nov 1994 08:49:37 GMT");
/// ```
#[must_use]
pub fn format_expiration(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Reads and writes upload expiry through the store, when possible.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpirationHelper<'a> {
    store: &'a StoreAdapter,
    policy: Option<ExpirationPolicy>,
}

impl<'a> ExpirationHelper<'a> {
    pub fn new(store: &'a StoreAdapter, config: &TusConfig) -> Self {
        Self {
            store,
            policy: config.expiration,
        }
    }

    pub fn policy(&self) -> Option<ExpirationPolicy> {
        self.policy
    }

    /// Expiration is only active with both a policy and store support.
    pub fn is_active(&self) -> bool {
        self.policy.is_some() && self.store.supports(TusExtensions::EXPIRATION)
    }

    /// Stamp `now + timeout` on the upload and return it.
    pub async fn set_expiration_if_supported(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<DateTime<Utc>>> {
        let Some(policy) = self.policy.filter(|_| self.is_active()) else {
            return Ok(None);
        };
        let expires = policy.expires_at(Utc::now())?;
        self.store
            .expiration()?
            .set_expiration(upload_id, expires, cancel)
            .await?;
        debug!(upload_id = %upload_id, expires = %expires, "stamped upload expiry");
        Ok(Some(expires))
    }

    /// Current expiry of the upload, without changing it.
    pub async fn get_expiration_if_supported(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<DateTime<Utc>>> {
        if !self.is_active() {
            return Ok(None);
        }
        self.store
            .expiration()?
            .get_expiration(upload_id, cancel)
            .await
    }
}
