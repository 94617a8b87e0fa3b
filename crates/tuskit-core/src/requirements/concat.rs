//! `Upload-Concat` on POST.

use super::Validation;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::headers::{UPLOAD_CONCAT, UPLOAD_LENGTH};
use crate::helpers::concatenation::validate_final_parts;
use crate::parsers::{UploadConcat, parse_upload_concat};

pub(super) async fn upload_concat_for_concatenate_files(
    ctx: &mut RequestContext,
) -> TusResult<Validation> {
    let header = ctx.header(UPLOAD_CONCAT).unwrap_or_default();
    let concat = match parse_upload_concat(header, &ctx.config.url_path) {
        Ok(concat) => concat,
        Err(err) => return Ok(Validation::bad_request(err.to_string())),
    };

    if let UploadConcat::Final(partial_ids) = &concat {
        let validation = validate_final_parts(
            &ctx.store,
            partial_ids,
            ctx.config.max_allowed_upload_size,
            &ctx.cancellation,
        )
        .await?;
        if validation != Validation::Continue {
            return Ok(validation);
        }
        if ctx.has_header(UPLOAD_LENGTH) {
            return Ok(Validation::bad_request(
                "Header Upload-Length must not be included when Upload-Concat is final",
            ));
        }
    }

    ctx.parsed.upload_concat = Some(concat);
    Ok(Validation::Continue)
}
