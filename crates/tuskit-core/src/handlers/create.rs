//! `POST` to the base path: create an upload.

use http::StatusCode;
use http::header::LOCATION;
use tracing::debug;

use super::ActionOutcome;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::events::{BeforeCreateContext, CreateCompleteContext, EventOutcome, Events};
use crate::headers::UPLOAD_EXPIRES;
use crate::helpers::expiration::{ExpirationHelper, format_expiration};
use crate::requirements::Requirement;

pub(super) const REQUIREMENTS: &[Requirement] =
    &[Requirement::UploadLength, Requirement::UploadMetadata];

/// Length to create the upload with; `None` when deferred.
pub(super) fn declared_length(ctx: &RequestContext) -> Option<u64> {
    if ctx.parsed.defer_length {
        None
    } else {
        ctx.parsed.upload_length
    }
}

pub(super) async fn before(ctx: &mut RequestContext, events: &Events) -> EventOutcome {
    let upload_length = declared_length(ctx);
    let parsed = &ctx.parsed;
    let headers = &ctx.headers;
    events
        .before_create(|| BeforeCreateContext {
            upload_length,
            defer_length: parsed.defer_length,
            metadata: parsed.metadata.clone().unwrap_or_default(),
            upload_concat: parsed.upload_concat.clone().unwrap_or_default(),
            headers: headers.clone(),
        })
        .await
}

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let upload_length = declared_length(ctx);
    let upload_id = ctx
        .store
        .creation()?
        .create_file(
            upload_length,
            ctx.parsed.metadata_raw.as_deref(),
            &ctx.cancellation,
        )
        .await?;
    debug!(upload_id = %upload_id, upload_length = ?upload_length, "created upload");

    let expires = ExpirationHelper::new(&ctx.store, &ctx.config)
        .set_expiration_if_supported(&upload_id, &ctx.cancellation)
        .await?;
    respond_created(ctx, &upload_id, expires);

    Ok(ActionOutcome::Created {
        completed: upload_length == Some(0),
        upload_id,
        upload_length,
    })
}

/// Fill the 201 response shared by creation and concatenation.
pub(super) fn respond_created(
    ctx: &mut RequestContext,
    upload_id: &str,
    expires: Option<chrono::DateTime<chrono::Utc>>,
) {
    let location = format!("{}/{upload_id}", ctx.config.url_path.trim_end_matches('/'));
    ctx.response.status = StatusCode::CREATED;
    ctx.response.set_header(LOCATION, location);
    if let Some(expires) = expires {
        ctx.response.set_header(UPLOAD_EXPIRES, format_expiration(expires));
    }
    ctx.upload_id = Some(upload_id.to_owned());
}

pub(super) async fn after(
    ctx: &mut RequestContext,
    events: &Events,
    upload_id: &str,
    upload_length: Option<u64>,
) -> EventOutcome {
    let parsed = &ctx.parsed;
    let headers = &ctx.headers;
    events
        .create_complete(|| CreateCompleteContext {
            upload_id: upload_id.to_owned(),
            upload_length,
            metadata: parsed.metadata.clone().unwrap_or_default(),
            upload_concat: parsed.upload_concat.clone().unwrap_or_default(),
            headers: headers.clone(),
        })
        .await
}
