//! Per-request protocol helpers.

pub(crate) mod checksum;
pub(crate) mod concatenation;
pub mod expiration;

pub use expiration::{ExpirationPolicy, format_expiration};
