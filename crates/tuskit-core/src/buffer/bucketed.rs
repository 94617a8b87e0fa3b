//! Bucketed write buffer strategy.
//!
//! The write buffer is split into `ceil(write_buffer_size / MAX_BUCKET_SIZE)`
//! equally sized buckets. Reads are spread across bucket boundaries and the
//! buckets are written to the sink one after another, only once every bucket
//! is full (plus a final flush at end of stream). Buckets are rented from a
//! small process-wide pool.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::{BufferSettings, CopyLimit, CopyOutcome, MAX_BUCKET_SIZE, ReadStep, check_limit, read_step};
use crate::cancellation::CancellationSignal;
use crate::error::TusResult;

const MAX_POOLED_BUCKETS: usize = 32;

fn pool() -> &'static Mutex<Vec<Vec<u8>>> {
    static POOL: OnceLock<Mutex<Vec<Vec<u8>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(Vec::new()))
}

fn rent(capacity: usize) -> Vec<u8> {
    let mut pool = pool().lock();
    match pool.iter().position(|b| b.capacity() >= capacity) {
        Some(idx) => pool.swap_remove(idx),
        None => Vec::with_capacity(capacity),
    }
}

fn give_back(mut bucket: Vec<u8>) {
    bucket.clear();
    let mut pool = pool().lock();
    if pool.len() < MAX_POOLED_BUCKETS {
        pool.push(bucket);
    }
}

struct Buckets {
    buckets: Vec<Vec<u8>>,
    bucket_size: usize,
    current: usize,
}

impl Buckets {
    fn new(write_buffer_size: usize) -> Self {
        let write_buffer_size = write_buffer_size.max(1);
        let count = write_buffer_size.div_ceil(MAX_BUCKET_SIZE);
        let bucket_size = write_buffer_size.div_ceil(count);
        Self {
            buckets: (0..count).map(|_| rent(bucket_size)).collect(),
            bucket_size,
            current: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.current == self.buckets.len() - 1
            && self.buckets[self.current].len() == self.bucket_size
    }

    /// Append as much of `data` as fits and return what is left.
    fn fill<'a>(&mut self, mut data: &'a [u8]) -> &'a [u8] {
        while !data.is_empty() && !self.is_full() {
            let bucket = &mut self.buckets[self.current];
            let room = self.bucket_size - bucket.len();
            let take = room.min(data.len());
            bucket.extend_from_slice(&data[..take]);
            data = &data[take..];
            if bucket.len() == self.bucket_size && self.current + 1 < self.buckets.len() {
                self.current += 1;
            }
        }
        data
    }

    async fn flush<W>(&mut self, sink: &mut W) -> TusResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        for bucket in self.buckets.iter_mut().filter(|b| !b.is_empty()) {
            sink.write_all(bucket).await?;
            written += bucket.len() as u64;
            bucket.clear();
        }
        self.current = 0;
        Ok(written)
    }
}

impl Drop for Buckets {
    fn drop(&mut self) {
        for bucket in self.buckets.drain(..) {
            give_back(bucket);
        }
    }
}

pub(super) async fn copy<R, W>(
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
    let mut read_buf = vec![0u8; settings.read_buffer_size.max(1)];
    let mut buckets = Buckets::new(settings.write_buffer_size);
    let mut total_read = 0u64;
    let mut outcome = CopyOutcome::default();

    loop {
        let n = match read_step(reader, &mut read_buf, cancel).await {
            ReadStep::Data(n) => n,
            ReadStep::Eof | ReadStep::Cancelled => break,
            ReadStep::Disconnected => {
                outcome.client_disconnected = true;
                break;
            }
        };

        total_read += n as u64;
        check_limit(limit, total_read)?;

        let mut rest = &read_buf[..n];
        while !rest.is_empty() {
            rest = buckets.fill(rest);
            if buckets.is_full() {
                outcome.bytes_written += buckets.flush(sink).await?;
            }
        }
    }

    outcome.bytes_written += buckets.flush(sink).await?;
    sink.flush().await?;

    Ok(outcome)
}
