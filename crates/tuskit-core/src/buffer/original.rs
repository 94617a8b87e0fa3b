//! Contiguous write buffer strategy.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::{BufferSettings, CopyLimit, CopyOutcome, ReadStep, check_limit, read_step};
use crate::cancellation::CancellationSignal;
use crate::error::TusResult;

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
    let write_size = settings.write_buffer_size.max(1);
    let mut read_buf = vec![0u8; settings.read_buffer_size.max(1)];
    let mut write_buf: Vec<u8> = Vec::with_capacity(write_size);
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

        if !write_buf.is_empty() && write_buf.len() + n > write_size {
            sink.write_all(&write_buf).await?;
            outcome.bytes_written += write_buf.len() as u64;
            write_buf.clear();
        }
        write_buf.extend_from_slice(&read_buf[..n]);
    }

    if !write_buf.is_empty() {
        sink.write_all(&write_buf).await?;
        outcome.bytes_written += write_buf.len() as u64;
    }
    sink.flush().await?;

    Ok(outcome)
}
