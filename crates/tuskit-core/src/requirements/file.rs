//! Requirements that look at the stored upload.

use chrono::Utc;
use http::StatusCode;

use super::Validation;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::helpers::concatenation::upload_concat_of;
use crate::store::TusExtensions;

pub(super) async fn file_exist(ctx: &mut RequestContext) -> TusResult<Validation> {
    let exists = ctx
        .core()
        .file_exists(ctx.file_id(), &ctx.cancellation)
        .await?;
    Ok(if exists {
        Validation::Continue
    } else {
        Validation::not_found()
    })
}

pub(super) async fn file_has_not_expired(ctx: &mut RequestContext) -> TusResult<Validation> {
    if !ctx.store.supports(TusExtensions::EXPIRATION) {
        return Ok(Validation::Continue);
    }
    let expires = ctx
        .store
        .expiration()?
        .get_expiration(ctx.file_id(), &ctx.cancellation)
        .await?;
    Ok(match expires {
        Some(expires) if expires < Utc::now() => Validation::not_found(),
        _ => Validation::Continue,
    })
}

pub(super) async fn upload_concat_for_write_file(
    ctx: &mut RequestContext,
) -> TusResult<Validation> {
    let concat = upload_concat_of(&ctx.store, ctx.file_id(), &ctx.cancellation).await?;
    Ok(if concat.is_final() {
        Validation::stop(
            StatusCode::FORBIDDEN,
            "File with \"Upload-Concat: final\" cannot be patched",
        )
    } else {
        Validation::Continue
    })
}

pub(super) async fn request_offset_matches_file_offset(
    ctx: &mut RequestContext,
) -> TusResult<Validation> {
    let file_offset = ctx
        .core()
        .get_upload_offset(ctx.file_id(), &ctx.cancellation)
        .await?;
    let request_offset = ctx.parsed.upload_offset.unwrap_or_default();
    Ok(if file_offset == request_offset {
        Validation::Continue
    } else {
        Validation::stop(
            StatusCode::CONFLICT,
            format!(
                "Offset does not match file. File offset: {file_offset}. Request offset: {request_offset}"
            ),
        )
    })
}

pub(super) async fn file_is_not_completed(ctx: &mut RequestContext) -> TusResult<Validation> {
    let core = ctx.core();
    let id = ctx.file_id();
    let Some(length) = core.get_upload_length(id, &ctx.cancellation).await? else {
        return Ok(Validation::Continue);
    };
    let offset = core.get_upload_offset(id, &ctx.cancellation).await?;
    Ok(if offset == length {
        Validation::bad_request("Upload is already complete.")
    } else {
        Validation::Continue
    })
}
