//! `HEAD` of an upload.

use http::header::CACHE_CONTROL;
use http::StatusCode;

use super::ActionOutcome;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::headers::{
    UPLOAD_CONCAT, UPLOAD_DEFER_LENGTH, UPLOAD_EXPIRES, UPLOAD_LENGTH, UPLOAD_METADATA,
    UPLOAD_OFFSET,
};
use crate::helpers::concatenation::upload_concat_of;
use crate::helpers::expiration::{ExpirationHelper, format_expiration};
use crate::requirements::Requirement;

pub(super) const REQUIREMENTS: &[Requirement] =
    &[Requirement::FileExist, Requirement::FileHasNotExpired];

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let upload_id = ctx.file_id().to_owned();
    let store = ctx.store.clone();
    let core = store.core();
    let cancel = &ctx.cancellation;

    let length = core.get_upload_length(&upload_id, cancel).await?;
    let offset = core.get_upload_offset(&upload_id, cancel).await?;
    let metadata = core.get_upload_metadata(&upload_id, cancel).await?;
    let concat = upload_concat_of(&store, &upload_id, cancel).await?;
    let expires = ExpirationHelper::new(&store, &ctx.config)
        .get_expiration_if_supported(&upload_id, cancel)
        .await?;

    let response = &mut ctx.response;
    response.status = StatusCode::OK;
    response.set_header(CACHE_CONTROL, "no-store");

    match length {
        Some(length) => response.set_header(UPLOAD_LENGTH, length),
        None => response.set_header(UPLOAD_DEFER_LENGTH, 1),
    }

    // A final upload reports no offset until it has been assembled.
    let assembling = concat.is_final() && length != Some(offset);
    if !assembling {
        response.set_header(UPLOAD_OFFSET, offset);
    }

    if let Some(metadata) = metadata.filter(|m| !m.is_empty()) {
        response.set_header(UPLOAD_METADATA, metadata);
    }
    if let Some(value) = concat.to_header_value(&ctx.config.url_path) {
        response.set_header(UPLOAD_CONCAT, value);
    }
    if let Some(expires) = expires {
        response.set_header(UPLOAD_EXPIRES, format_expiration(expires));
    }

    Ok(ActionOutcome::Responded)
}
