//! In-memory reference store.
//!
//! [`InMemoryStore`] keeps every upload in memory and implements every
//! optional role, so the whole protocol can be exercised without a real
//! backend. It is thread-safe: uploads live in a [`DashMap`] and each upload
//! is guarded by its own async mutex, held for the duration of an append so
//! the chunk boundary used by checksum verification stays consistent.
//!
//! Nothing is persisted; dropping the store drops every upload.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{
    ChecksumStore, ChunkStream, ConcatenationStore, CreationDeferLengthStore, CreationStore,
    ExpirationStore, PipelineStore, ReadableStore, StoredFile, TerminationStore, TusStore,
};
use crate::buffer::{BufferSettings, CopyLimit, copy_to_sink};
use crate::cancellation::CancellationSignal;
use crate::checksums::{ChecksumAlgorithm, matches_checksum};
use crate::context::RequestBody;
use crate::error::{TusError, TusResult};
use crate::parsers::UploadConcat;

// ---------------------------------------------------------------------------
// UploadRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct UploadRecord {
    data: Vec<u8>,
    length: Option<u64>,
    metadata: Option<String>,
    concat: UploadConcat,
    expires: Option<DateTime<Utc>>,
    /// Where the last append started, for checksum verification.
    chunk_start: Option<usize>,
}

impl UploadRecord {
    fn offset(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_complete(&self) -> bool {
        self.length == Some(self.offset())
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Store that keeps uploads in memory.
///
/// # Examples
///
/// ```
/// use tuskit_core::cancellation::CancellationSignal;
/// use tuskit_core::store::{CreationStore, InMemoryStore, TusStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// let cancel = CancellationSignal::new();
/// let id = store.create_file(Some(5), None, &cancel).await.unwrap();
/// assert_eq!(store.get_upload_offset(&id, &cancel).await.unwrap(), 0);
/// # });
/// ```
pub struct InMemoryStore {
    uploads: DashMap<String, Arc<Mutex<UploadRecord>>>,
    buffer: BufferSettings,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("upload_count", &self.uploads.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store with default buffer settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer_settings(BufferSettings::default())
    }

    /// Create an empty store that copies request bodies with `buffer`.
    #[must_use]
    pub fn with_buffer_settings(buffer: BufferSettings) -> Self {
        Self {
            uploads: DashMap::new(),
            buffer,
        }
    }

    /// Number of uploads held.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    fn record(&self, upload_id: &str) -> TusResult<Arc<Mutex<UploadRecord>>> {
        self.uploads
            .get(upload_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TusError::not_found(upload_id))
    }

    fn insert(&self, record: UploadRecord) -> String {
        let id = Uuid::new_v4().simple().to_string();
        debug!(
            upload_id = %id,
            length = ?record.length,
            concat = ?record.concat,
            "created upload"
        );
        self.uploads.insert(id.clone(), Arc::new(Mutex::new(record)));
        id
    }

    async fn expired_ids(&self) -> Vec<String> {
        let now = Utc::now();
        let records: Vec<(String, Arc<Mutex<UploadRecord>>)> = self
            .uploads
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut expired = Vec::new();
        for (id, record) in records {
            let record = record.lock().await;
            if record.expires.is_some_and(|at| at < now) && !record.is_complete() {
                expired.push(id);
            }
        }
        expired
    }
}

#[async_trait]
impl TusStore for InMemoryStore {
    async fn append_data(
        &self,
        upload_id: &str,
        body: &mut RequestBody,
        cancel: &CancellationSignal,
    ) -> TusResult<u64> {
        let record = self.record(upload_id)?;
        let mut record = record.lock().await;
        let start = record.data.len();
        let limit = CopyLimit {
            offset: record.offset(),
            upload_length: record.length,
        };
        record.chunk_start = Some(start);

        let outcome = copy_to_sink(&self.buffer, body, &mut record.data, limit, cancel).await?;
        debug!(
            upload_id = %upload_id,
            bytes_written = outcome.bytes_written,
            client_disconnected = outcome.client_disconnected,
            offset = record.offset(),
            "appended chunk"
        );
        Ok(outcome.bytes_written)
    }

    async fn file_exists(&self, upload_id: &str, _cancel: &CancellationSignal) -> TusResult<bool> {
        Ok(self.uploads.contains_key(upload_id))
    }

    async fn get_upload_length(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<Option<u64>> {
        Ok(self.record(upload_id)?.lock().await.length)
    }

    async fn get_upload_offset(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<u64> {
        Ok(self.record(upload_id)?.lock().await.offset())
    }

    async fn get_upload_metadata(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<Option<String>> {
        Ok(self.record(upload_id)?.lock().await.metadata.clone())
    }

    fn creation(&self) -> Option<&dyn CreationStore> {
        Some(self)
    }

    fn termination(&self) -> Option<&dyn TerminationStore> {
        Some(self)
    }

    fn checksum(&self) -> Option<&dyn ChecksumStore> {
        Some(self)
    }

    fn concatenation(&self) -> Option<&dyn ConcatenationStore> {
        Some(self)
    }

    fn creation_defer_length(&self) -> Option<&dyn CreationDeferLengthStore> {
        Some(self)
    }

    fn expiration(&self) -> Option<&dyn ExpirationStore> {
        Some(self)
    }

    fn readable(&self) -> Option<&dyn ReadableStore> {
        Some(self)
    }

    fn pipeline(&self) -> Option<&dyn PipelineStore> {
        Some(self)
    }
}

#[async_trait]
impl CreationStore for InMemoryStore {
    async fn create_file(
        &self,
        upload_length: Option<u64>,
        metadata: Option<&str>,
        _cancel: &CancellationSignal,
    ) -> TusResult<String> {
        Ok(self.insert(UploadRecord {
            length: upload_length,
            metadata: metadata.map(str::to_owned),
            ..UploadRecord::default()
        }))
    }
}

#[async_trait]
impl TerminationStore for InMemoryStore {
    async fn delete_file(&self, upload_id: &str, _cancel: &CancellationSignal) -> TusResult<()> {
        self.uploads
            .remove(upload_id)
            .ok_or_else(|| TusError::not_found(upload_id))?;
        debug!(upload_id = %upload_id, "deleted upload");
        Ok(())
    }
}

#[async_trait]
impl ChecksumStore for InMemoryStore {
    async fn supported_algorithms(&self, _cancel: &CancellationSignal) -> TusResult<Vec<String>> {
        Ok(ChecksumAlgorithm::ALL
            .iter()
            .map(|alg| alg.as_str().to_owned())
            .collect())
    }

    async fn verify_checksum(
        &self,
        upload_id: &str,
        algorithm: &str,
        hash: &[u8],
        _cancel: &CancellationSignal,
    ) -> TusResult<bool> {
        let record = self.record(upload_id)?;
        let mut record = record.lock().await;
        let start = record.chunk_start.take().unwrap_or(record.data.len());

        let matches = algorithm
            .parse::<ChecksumAlgorithm>()
            .is_ok_and(|alg| matches_checksum(alg, &record.data[start..], hash));
        if !matches {
            trace!(
                upload_id = %upload_id,
                discarded = record.data.len() - start,
                "discarding unverified chunk"
            );
            record.data.truncate(start);
        }
        Ok(matches)
    }
}

#[async_trait]
impl ConcatenationStore for InMemoryStore {
    async fn create_partial_file(
        &self,
        upload_length: Option<u64>,
        metadata: Option<&str>,
        _cancel: &CancellationSignal,
    ) -> TusResult<String> {
        Ok(self.insert(UploadRecord {
            length: upload_length,
            metadata: metadata.map(str::to_owned),
            concat: UploadConcat::Partial,
            ..UploadRecord::default()
        }))
    }

    async fn create_final_file(
        &self,
        partial_ids: &[String],
        metadata: Option<&str>,
        _cancel: &CancellationSignal,
    ) -> TusResult<String> {
        let mut data = Vec::new();
        for id in partial_ids {
            let partial = self.record(id)?;
            data.extend_from_slice(&partial.lock().await.data);
        }
        let length = data.len() as u64;
        Ok(self.insert(UploadRecord {
            data,
            length: Some(length),
            metadata: metadata.map(str::to_owned),
            concat: UploadConcat::Final(partial_ids.to_vec()),
            ..UploadRecord::default()
        }))
    }

    async fn get_upload_concat(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<UploadConcat> {
        Ok(self.record(upload_id)?.lock().await.concat.clone())
    }
}

#[async_trait]
impl CreationDeferLengthStore for InMemoryStore {
    async fn set_upload_length(
        &self,
        upload_id: &str,
        upload_length: u64,
        _cancel: &CancellationSignal,
    ) -> TusResult<()> {
        let record = self.record(upload_id)?;
        let mut record = record.lock().await;
        if record.length.is_some() {
            return Err(TusError::store(
                "Upload-Length cannot be changed once it has been set",
            ));
        }
        record.length = Some(upload_length);
        Ok(())
    }
}

#[async_trait]
impl ExpirationStore for InMemoryStore {
    async fn set_expiration(
        &self,
        upload_id: &str,
        expires: DateTime<Utc>,
        _cancel: &CancellationSignal,
    ) -> TusResult<()> {
        self.record(upload_id)?.lock().await.expires = Some(expires);
        Ok(())
    }

    async fn get_expiration(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<Option<DateTime<Utc>>> {
        Ok(self.record(upload_id)?.lock().await.expires)
    }

    async fn get_expired_files(&self, _cancel: &CancellationSignal) -> TusResult<Vec<String>> {
        Ok(self.expired_ids().await)
    }

    async fn remove_expired_files(&self, _cancel: &CancellationSignal) -> TusResult<usize> {
        let expired = self.expired_ids().await;
        for id in &expired {
            self.uploads.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "removed expired uploads");
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl ReadableStore for InMemoryStore {
    async fn get_file(
        &self,
        upload_id: &str,
        _cancel: &CancellationSignal,
    ) -> TusResult<Option<StoredFile>> {
        let Ok(record) = self.record(upload_id) else {
            return Ok(None);
        };
        let record = record.lock().await;
        Ok(Some(StoredFile {
            id: upload_id.to_owned(),
            metadata: record.metadata.clone(),
            content: Bytes::copy_from_slice(&record.data),
        }))
    }
}

#[async_trait]
impl PipelineStore for InMemoryStore {
    async fn append_stream(
        &self,
        upload_id: &str,
        mut chunks: ChunkStream<'_>,
        cancel: &CancellationSignal,
    ) -> TusResult<u64> {
        let record = self.record(upload_id)?;
        let mut record = record.lock().await;
        let start = record.data.len();
        record.chunk_start = Some(start);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = chunks.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    trace!(upload_id = %upload_id, error = %e, "chunk stream failed, treating as disconnect");
                    break;
                }
                None => break,
            };

            let stream_data = record.offset() + chunk.len() as u64;
            if let Some(upload_length) = record.length {
                if stream_data > upload_length {
                    return Err(TusError::store(format!(
                        "Stream contains more data than the file's upload length. Stream data: {stream_data}, upload length: {upload_length}."
                    )));
                }
            }
            record.data.extend_from_slice(&chunk);
        }

        let written = (record.data.len() - start) as u64;
        debug!(upload_id = %upload_id, bytes_written = written, "appended chunk stream");
        Ok(written)
    }
}
