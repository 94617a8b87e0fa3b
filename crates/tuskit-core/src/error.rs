//! Engine error types.
//!
//! Defines [`TusError`], the error enum shared by the engine, the store
//! contract and the copy strategies. Validation failures are *not* errors:
//! they are turned into protocol responses by the requirement pipeline. A
//! `TusError` either maps to a fixed response (store rejections, missing
//! uploads) or escapes the engine for the host to translate into a 500.
//!
//! # Usage
//!
//! ```
//! use tuskit_core::error::TusError;
//!
//! let err = TusError::store("Stream contains more data than the file's upload length");
//! assert!(err.to_string().starts_with("Stream contains"));
//! ```

/// tus engine error type.
#[derive(Debug, thiserror::Error)]
pub enum TusError {
    // -----------------------------------------------------------------------
    // Capability errors
    // -----------------------------------------------------------------------
    /// A protocol extension was used against a store that does not implement
    /// the matching role (or the role was disallowed by configuration).
    #[error("The store does not implement the {role} role")]
    NotSupported {
        /// Name of the missing store role.
        role: &'static str,
    },

    // -----------------------------------------------------------------------
    // Store errors
    // -----------------------------------------------------------------------
    /// The store rejected the operation. The message is sent to the client
    /// verbatim with a 400 status.
    #[error("{message}")]
    Store {
        /// Client-facing description of the rejection.
        message: String,
    },

    /// The upload does not exist in the store.
    #[error("The specified upload does not exist: {upload_id}")]
    NotFound {
        /// The upload ID that was not found.
        upload_id: String,
    },

    // -----------------------------------------------------------------------
    // Internal / catch-all
    // -----------------------------------------------------------------------
    /// I/O failure while talking to storage.
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TusError {
    /// Build a [`TusError::Store`] from a client-facing message.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Build a [`TusError::NotFound`] for the given upload.
    #[must_use]
    pub fn not_found(upload_id: impl Into<String>) -> Self {
        Self::NotFound {
            upload_id: upload_id.into(),
        }
    }
}

/// Convenience result type for engine and store operations.
pub type TusResult<T> = Result<T, TusError>;
