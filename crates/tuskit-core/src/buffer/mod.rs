//! Buffered copy from a client stream into storage.
//!
//! Both strategies read the body in fixed-size reads, enforce the upload's
//! length budget before buffering anything, and report how many bytes reached
//! the sink. A read error is treated as a client disconnect and a cancelled
//! request as a clean stop: neither is an error, and whatever was buffered is
//! still flushed.
//!
//! ```text
//! reader --read_buffer--> [length check] --> write buffer --flush--> sink
//! ```
//!
//! - [`BufferStrategy::Original`] uses one contiguous write buffer.
//! - [`BufferStrategy::NonConsecutiveBuckets`] splits the write buffer into
//!   pooled buckets so large write buffers never need one big allocation.

mod bucketed;
mod original;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::trace;
use typed_builder::TypedBuilder;

use crate::cancellation::CancellationSignal;
use crate::error::{TusError, TusResult};

/// Default size of a single read from the client, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 51_200;

/// Default size of the write buffer, in bytes.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 51_200;

/// Upper bound for a single bucket of [`BufferStrategy::NonConsecutiveBuckets`].
pub const MAX_BUCKET_SIZE: usize = 84_000;

/// How the write buffer is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferStrategy {
    /// One contiguous write buffer.
    #[default]
    Original,
    /// A write buffer made of fixed-size buckets, flushed when all are full.
    NonConsecutiveBuckets,
}

/// Copy strategy settings.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferSettings {
    /// Bytes requested from the reader per read.
    #[builder(default = DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer_size: usize,
    /// Bytes buffered before writing to the sink.
    #[builder(default = DEFAULT_WRITE_BUFFER_SIZE)]
    pub write_buffer_size: usize,
    /// Write buffer layout.
    #[builder(default)]
    pub strategy: BufferStrategy,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Where the copy starts and how far it may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyLimit {
    /// Offset of the upload before the copy.
    pub offset: u64,
    /// Total upload length, `None` while deferred.
    pub upload_length: Option<u64>,
}

/// Result of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOutcome {
    /// Bytes written to the sink.
    pub bytes_written: u64,
    /// The reader failed, which is how a dropped client shows up.
    pub client_disconnected: bool,
}

/// Copy `reader` into `sink` using the configured strategy.
///
/// # Errors
///
/// Returns [`TusError::Store`] when the stream holds more data than the
/// upload has room for, and [`TusError::Io`] when the sink fails.
pub async fn copy_to_sink<R, W>(
    settings: &BufferSettings,
    reader: &mut R,
    sink: &mut W,
    limit: CopyLimit,
    cancel: &CancellationSignal,
) -> TusResult<CopyOutcome>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let outcome = match settings.strategy {
        BufferStrategy::Original => {
            original::copy(settings, reader, sink, limit, cancel).await?
        }
        BufferStrategy::NonConsecutiveBuckets => {
            bucketed::copy(settings, reader, sink, limit, cancel).await?
        }
    };
    trace!(
        bytes_written = outcome.bytes_written,
        client_disconnected = outcome.client_disconnected,
        strategy = ?settings.strategy,
        "copied request body"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Shared read step
// ---------------------------------------------------------------------------

enum ReadStep {
    Data(usize),
    Eof,
    Disconnected,
    Cancelled,
}

async fn read_step<R>(reader: &mut R, buf: &mut [u8], cancel: &CancellationSignal) -> ReadStep
where
    R: AsyncRead + Unpin + ?Sized,
{
    if cancel.is_cancelled() {
        return ReadStep::Cancelled;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => ReadStep::Cancelled,
        res = reader.read(buf) => match res {
            Ok(0) => ReadStep::Eof,
            Ok(n) => ReadStep::Data(n),
            Err(e) => {
                trace!(error = %e, "client stream failed, treating as disconnect");
                ReadStep::Disconnected
            }
        },
    }
}

fn check_limit(limit: CopyLimit, total_read: u64) -> TusResult<()> {
    let Some(upload_length) = limit.upload_length else {
        return Ok(());
    };
    let stream_data = limit.offset.saturating_add(total_read);
    if stream_data > upload_length {
        return Err(TusError::store(format!(
            "Stream contains more data than the file's upload length. Stream data: {stream_data}, upload length: {upload_length}."
        )));
    }
    Ok(())
}
