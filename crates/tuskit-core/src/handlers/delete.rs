//! `DELETE` of an upload.

use http::StatusCode;
use tracing::debug;

use super::ActionOutcome;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::events::{BeforeDeleteContext, DeleteCompleteContext, EventOutcome, Events};
use crate::requirements::Requirement;

pub(super) const REQUIREMENTS: &[Requirement] =
    &[Requirement::FileExist, Requirement::FileHasNotExpired];

pub(super) async fn before(ctx: &mut RequestContext, events: &Events) -> EventOutcome {
    let upload_id = ctx.file_id().to_owned();
    let headers = &ctx.headers;
    events
        .before_delete(|| BeforeDeleteContext {
            upload_id,
            headers: headers.clone(),
        })
        .await
}

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let upload_id = ctx.file_id().to_owned();
    ctx.store
        .termination()?
        .delete_file(&upload_id, &ctx.cancellation)
        .await?;
    debug!(upload_id = %upload_id, "deleted upload");

    ctx.response.status = StatusCode::NO_CONTENT;
    Ok(ActionOutcome::Deleted { upload_id })
}

pub(super) async fn after(events: &Events, upload_id: &str) -> EventOutcome {
    events
        .delete_complete(|| DeleteCompleteContext {
            upload_id: upload_id.to_owned(),
        })
        .await
}
