//! `POST` with `Upload-Concat`: create a partial or final upload.

use tracing::debug;

use super::ActionOutcome;
use super::create::{declared_length, respond_created};
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::helpers::expiration::ExpirationHelper;
use crate::parsers::UploadConcat;
use crate::requirements::Requirement;

pub(super) const REQUIREMENTS: &[Requirement] = &[
    Requirement::UploadConcatForConcatenateFiles,
    Requirement::UploadLength,
    Requirement::UploadMetadata,
];

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let concat = ctx.parsed.upload_concat.clone().unwrap_or_default();
    let metadata = ctx.parsed.metadata_raw.clone();
    let store = ctx.store.clone();
    let concatenation = store.concatenation()?;

    let (upload_id, upload_length, completed) = match &concat {
        UploadConcat::Final(partial_ids) => {
            let upload_id = concatenation
                .create_final_file(partial_ids, metadata.as_deref(), &ctx.cancellation)
                .await?;
            let upload_length = store
                .core()
                .get_upload_length(&upload_id, &ctx.cancellation)
                .await?;
            debug!(
                upload_id = %upload_id,
                parts = partial_ids.len(),
                upload_length = ?upload_length,
                "created final upload"
            );
            (upload_id, upload_length, true)
        }
        UploadConcat::Partial | UploadConcat::None => {
            let upload_length = declared_length(ctx);
            let upload_id = concatenation
                .create_partial_file(upload_length, metadata.as_deref(), &ctx.cancellation)
                .await?;
            debug!(upload_id = %upload_id, upload_length = ?upload_length, "created partial upload");
            (upload_id, upload_length, false)
        }
    };

    // Final uploads do not expire on their own.
    let expires = if concat.is_final() {
        None
    } else {
        ExpirationHelper::new(&store, &ctx.config)
            .set_expiration_if_supported(&upload_id, &ctx.cancellation)
            .await?
    };
    respond_created(ctx, &upload_id, expires);

    Ok(ActionOutcome::Created {
        upload_id,
        upload_length,
        completed,
    })
}
