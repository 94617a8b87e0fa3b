//! `OPTIONS` on the base path: advertise the server's capabilities.

use http::StatusCode;

use super::ActionOutcome;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::headers::{
    TUS_CHECKSUM_ALGORITHM, TUS_EXTENSION, TUS_MAX_SIZE, TUS_VERSION, TUS_VERSION_VALUE,
};
use crate::store::TusExtensions;

pub(super) async fn invoke(ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
    let mut extensions = ctx.store.extensions();
    // Trailers are only advertised when this transport can deliver them.
    if ctx.trailers.is_none() {
        extensions.remove(TusExtensions::CHECKSUM_TRAILER);
    }

    let algorithms = if extensions.contains(TusExtensions::CHECKSUM) {
        let store = ctx.store.clone();
        Some(
            ctx.checksum
                .supported_algorithms(&store, &ctx.cancellation)
                .await?
                .join(","),
        )
    } else {
        None
    };

    let response = &mut ctx.response;
    response.status = StatusCode::NO_CONTENT;
    response.set_header(TUS_VERSION, TUS_VERSION_VALUE);
    if !extensions.is_empty() {
        response.set_header(TUS_EXTENSION, extensions.to_header_value());
    }
    if let Some(max) = ctx.config.max_allowed_upload_size {
        response.set_header(TUS_MAX_SIZE, max);
    }
    if let Some(algorithms) = algorithms.filter(|a| !a.is_empty()) {
        response.set_header(TUS_CHECKSUM_ALGORITHM, algorithms);
    }

    Ok(ActionOutcome::Responded)
}
