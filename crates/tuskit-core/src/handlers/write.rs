//! `PATCH` to an upload: append the body.

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::ActionOutcome;
use crate::buffer::DEFAULT_READ_BUFFER_SIZE;
use crate::context::{RequestBody, RequestContext};
use crate::error::TusResult;
use crate::events::{BeforeWriteContext, EventOutcome, Events};
use crate::headers::{UPLOAD_EXPIRES, UPLOAD_OFFSET};
use crate::helpers::expiration::{ExpirationHelper, format_expiration};
use crate::requirements::{Requirement, Validation};
use crate::store::{ChunkStream, StoreFeatures};

pub(super) const REQUIREMENTS: &[Requirement] = &[
    Requirement::ContentType,
    Requirement::UploadOffset,
    Requirement::UploadChecksum,
    Requirement::FileExist,
    Requirement::FileHasNotExpired,
    Requirement::UploadConcatForWriteFile,
    Requirement::UploadLengthForWriteFile,
    Requirement::RequestOffsetMatchesFileOffset,
    Requirement::FileIsNotCompleted,
];

pub(super) async fn before(ctx: &mut RequestContext, events: &Events) -> EventOutcome {
    let upload_id = ctx.file_id().to_owned();
    let upload_offset = ctx.parsed.upload_offset.unwrap_or_default();
    let upload_length = ctx.parsed.upload_length;
    let headers = &ctx.headers;
    events
        .before_write(|| BeforeWriteContext {
            upload_id,
            upload_offset,
            upload_length,
            headers: headers.clone(),
        })
        .await
}

/// Read the body as a stream of chunks of at most `chunk_size` bytes. A read
/// error is yielded once and ends the stream.
fn body_chunks(body: &mut RequestBody, chunk_size: usize) -> ChunkStream<'_> {
    futures::stream::unfold(Some(body), move |body| async move {
        let body = body?;
        let mut buf = vec![0u8; chunk_size];
        match body.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(body)))
            }
            Err(err) => Some((Err(err), None)),
        }
    })
    .boxed()
}

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let upload_id = ctx.file_id().to_owned();
    let store = ctx.store.clone();

    if let Some(length) = ctx.parsed.upload_length {
        store
            .creation_defer_length()?
            .set_upload_length(&upload_id, length, &ctx.cancellation)
            .await?;
        debug!(upload_id = %upload_id, upload_length = length, "set deferred upload length");
    }

    let use_pipeline =
        ctx.config.prefer_pipelines && store.has_feature(StoreFeatures::STREAMING_PIPELINE);
    let written = if use_pipeline {
        let chunks = body_chunks(&mut ctx.body, DEFAULT_READ_BUFFER_SIZE);
        store
            .pipeline()?
            .append_stream(&upload_id, chunks, &ctx.cancellation)
            .await?
    } else {
        store
            .core()
            .append_data(&upload_id, &mut ctx.body, &ctx.cancellation)
            .await?
    };
    debug!(
        upload_id = %upload_id,
        bytes = written,
        pipeline = use_pipeline,
        cancelled = ctx.cancellation.is_cancelled(),
        "appended data"
    );

    if ctx.checksum.is_pending() {
        let trailers = ctx.trailers.take();
        let verdict = ctx
            .checksum
            .verify(&store, &upload_id, trailers, &ctx.cancellation)
            .await?;
        if let Validation::Stop(rejection) = verdict {
            ctx.fail(rejection.status, rejection.message);
            return Ok(ActionOutcome::Stopped);
        }
    }

    let expiration = ExpirationHelper::new(&store, &ctx.config);
    let expires = match expiration.policy() {
        Some(policy) if policy.is_sliding() => {
            expiration
                .set_expiration_if_supported(&upload_id, &ctx.cancellation)
                .await?
        }
        _ => {
            expiration
                .get_expiration_if_supported(&upload_id, &ctx.cancellation)
                .await?
        }
    };

    let core = store.core();
    let offset = core.get_upload_offset(&upload_id, &ctx.cancellation).await?;
    let length = core.get_upload_length(&upload_id, &ctx.cancellation).await?;

    ctx.response.status = StatusCode::NO_CONTENT;
    ctx.response.set_header(UPLOAD_OFFSET, offset);
    if let Some(expires) = expires {
        ctx.response.set_header(UPLOAD_EXPIRES, format_expiration(expires));
    }

    Ok(ActionOutcome::Written {
        completed: length == Some(offset),
        upload_id,
    })
}
