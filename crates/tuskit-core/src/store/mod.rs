//! The storage contract.
//!
//! A backend implements [`TusStore`] for the core protocol and opts into each
//! extension by returning `Some(self)` from the matching role accessor
//! (`creation()`, `checksum()`, ...). The engine probes the accessors once
//! when the store is bound (see [`StoreAdapter`]) and never calls a role the
//! store did not advertise.
//!
//! Every operation receives the request's [`CancellationSignal`]. Stores
//! should treat cancellation as "stop early, keep what was written" rather
//! than as an error.

pub mod capabilities;
pub mod memory;

use std::fmt;
use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::cancellation::CancellationSignal;
use crate::context::RequestBody;
use crate::error::TusResult;
use crate::parsers::{MetadataMap, MetadataParseError, MetadataParsingStrategy, UploadConcat};

pub use capabilities::{StoreAdapter, StoreFeatures, TusExtensions};
pub use memory::InMemoryStore;

// ---------------------------------------------------------------------------
// Core contract
// ---------------------------------------------------------------------------

/// Core storage operations every backend must provide.
#[async_trait]
pub trait TusStore: Send + Sync + fmt::Debug {
    /// Append the request body to the upload and return the number of bytes
    /// written.
    ///
    /// The store must refuse to grow the upload past its length with a
    /// [`TusError::Store`](crate::error::TusError::Store), and must keep the
    /// bytes already written when the client disconnects or the request is
    /// cancelled.
    async fn append_data(
        &self,
        upload_id: &str,
        body: &mut RequestBody,
        cancel: &CancellationSignal,
    ) -> TusResult<u64>;

    /// Whether the upload exists.
    async fn file_exists(&self, upload_id: &str, cancel: &CancellationSignal) -> TusResult<bool>;

    /// Total length of the upload, or `None` while it is deferred.
    async fn get_upload_length(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<u64>>;

    /// Number of bytes received so far.
    async fn get_upload_offset(&self, upload_id: &str, cancel: &CancellationSignal)
    -> TusResult<u64>;

    /// Raw `Upload-Metadata` value stored at creation.
    async fn get_upload_metadata(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<String>>;

    /// The creation role, if implemented.
    fn creation(&self) -> Option<&dyn CreationStore> {
        None
    }

    /// The termination role, if implemented.
    fn termination(&self) -> Option<&dyn TerminationStore> {
        None
    }

    /// The checksum role, if implemented.
    fn checksum(&self) -> Option<&dyn ChecksumStore> {
        None
    }

    /// The concatenation role, if implemented.
    fn concatenation(&self) -> Option<&dyn ConcatenationStore> {
        None
    }

    /// The creation-defer-length role, if implemented.
    fn creation_defer_length(&self) -> Option<&dyn CreationDeferLengthStore> {
        None
    }

    /// The expiration role, if implemented.
    fn expiration(&self) -> Option<&dyn ExpirationStore> {
        None
    }

    /// The readable role, if implemented.
    fn readable(&self) -> Option<&dyn ReadableStore> {
        None
    }

    /// The streaming pipeline role, if implemented.
    fn pipeline(&self) -> Option<&dyn PipelineStore> {
        None
    }
}

// ---------------------------------------------------------------------------
// Optional roles
// ---------------------------------------------------------------------------

/// `creation` extension.
#[async_trait]
pub trait CreationStore: Send + Sync {
    /// Create an upload and return its id. `upload_length` is `None` when the
    /// client deferred the length.
    async fn create_file(
        &self,
        upload_length: Option<u64>,
        metadata: Option<&str>,
        cancel: &CancellationSignal,
    ) -> TusResult<String>;
}

/// `termination` extension.
#[async_trait]
pub trait TerminationStore: Send + Sync {
    /// Delete the upload and its data.
    async fn delete_file(&self, upload_id: &str, cancel: &CancellationSignal) -> TusResult<()>;
}

/// `checksum` extension.
///
/// Verification runs after the chunk has been appended. On mismatch the
/// store must discard everything written by the last
/// [`TusStore::append_data`] call, so the offset falls back to where it was
/// before the request.
#[async_trait]
pub trait ChecksumStore: Send + Sync {
    /// Lowercase algorithm names the store can verify.
    async fn supported_algorithms(&self, cancel: &CancellationSignal) -> TusResult<Vec<String>>;

    /// Verify the last appended chunk against `hash`.
    async fn verify_checksum(
        &self,
        upload_id: &str,
        algorithm: &str,
        hash: &[u8],
        cancel: &CancellationSignal,
    ) -> TusResult<bool>;
}

/// `concatenation` extension.
#[async_trait]
pub trait ConcatenationStore: Send + Sync {
    /// Create a partial upload.
    async fn create_partial_file(
        &self,
        upload_length: Option<u64>,
        metadata: Option<&str>,
        cancel: &CancellationSignal,
    ) -> TusResult<String>;

    /// Create a final upload by concatenating the given partial uploads in
    /// order. All partials are complete when this is called.
    async fn create_final_file(
        &self,
        partial_ids: &[String],
        metadata: Option<&str>,
        cancel: &CancellationSignal,
    ) -> TusResult<String>;

    /// Concatenation role of the upload.
    async fn get_upload_concat(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<UploadConcat>;
}

/// `creation-defer-length` extension.
#[async_trait]
pub trait CreationDeferLengthStore: Send + Sync {
    /// Set the length of an upload created with a deferred length.
    async fn set_upload_length(
        &self,
        upload_id: &str,
        upload_length: u64,
        cancel: &CancellationSignal,
    ) -> TusResult<()>;
}

/// `expiration` extension.
#[async_trait]
pub trait ExpirationStore: Send + Sync {
    /// Stamp the upload's expiry.
    async fn set_expiration(
        &self,
        upload_id: &str,
        expires: DateTime<Utc>,
        cancel: &CancellationSignal,
    ) -> TusResult<()>;

    /// Current expiry of the upload, if any.
    async fn get_expiration(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<DateTime<Utc>>>;

    /// Ids of incomplete uploads whose expiry has passed.
    async fn get_expired_files(&self, cancel: &CancellationSignal) -> TusResult<Vec<String>>;

    /// Remove every expired upload and return how many were removed.
    async fn remove_expired_files(&self, cancel: &CancellationSignal) -> TusResult<usize>;
}

/// Read access to stored uploads, for hosts that serve files back.
#[async_trait]
pub trait ReadableStore: Send + Sync {
    /// Fetch the upload, or `None` if it does not exist.
    async fn get_file(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<StoredFile>>;
}

/// A stream of body chunks handed to a [`PipelineStore`].
pub type ChunkStream<'a> = BoxStream<'a, io::Result<Bytes>>;

/// Append from a chunk stream instead of a reader.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Append every chunk of `chunks` and return the number of bytes written.
    /// Same length and cancellation rules as [`TusStore::append_data`].
    async fn append_stream(
        &self,
        upload_id: &str,
        chunks: ChunkStream<'_>,
        cancel: &CancellationSignal,
    ) -> TusResult<u64>;
}

// ---------------------------------------------------------------------------
// StoredFile
// ---------------------------------------------------------------------------

/// A stored upload as returned by [`ReadableStore::get_file`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Upload id.
    pub id: String,
    /// Raw `Upload-Metadata` value.
    pub metadata: Option<String>,
    /// Bytes received so far.
    pub content: Bytes,
}

impl StoredFile {
    /// A reader over the content.
    #[must_use]
    pub fn reader(&self) -> io::Cursor<Bytes> {
        io::Cursor::new(self.content.clone())
    }

    /// Decode the stored metadata.
    pub fn metadata_map(
        &self,
        strategy: MetadataParsingStrategy,
    ) -> Result<MetadataMap, MetadataParseError> {
        crate::parsers::parse_metadata(self.metadata.as_deref().unwrap_or_default(), strategy)
    }
}
