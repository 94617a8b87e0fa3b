//! Requirements that only look at request headers (plus store support).

use http::{StatusCode, header};

use super::Validation;
use crate::context::RequestContext;
use crate::error::TusResult;
use crate::headers::{
    OFFSET_OCTET_STREAM, UPLOAD_DEFER_LENGTH, UPLOAD_LENGTH, UPLOAD_METADATA, UPLOAD_OFFSET,
};
use crate::parsers::parse_metadata;
use crate::store::TusExtensions;

pub(super) fn content_type(ctx: &RequestContext) -> Validation {
    let matches = ctx
        .header(header::CONTENT_TYPE)
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(OFFSET_OCTET_STREAM));
    if matches {
        Validation::Continue
    } else {
        Validation::stop(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Content-Type {OFFSET_OCTET_STREAM} is required"),
        )
    }
}

enum LengthError {
    Unparsable,
    Negative,
    TooLarge,
}

fn parse_length(value: Option<&str>, max: Option<u64>) -> Result<u64, LengthError> {
    let value = value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(LengthError::Unparsable)?;
    let value = u64::try_from(value).map_err(|_| LengthError::Negative)?;
    if max.is_some_and(|max| value > max) {
        return Err(LengthError::TooLarge);
    }
    Ok(value)
}

fn length_rejection(err: &LengthError) -> Validation {
    match err {
        LengthError::Unparsable => Validation::bad_request("Could not parse Upload-Length"),
        LengthError::Negative => {
            Validation::bad_request("Header Upload-Length must be a positive number")
        }
        LengthError::TooLarge => Validation::stop(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Header Upload-Length exceeds the server's max file size.",
        ),
    }
}

/// `Upload-Length` / `Upload-Defer-Length` on creation. Final uploads get
/// their length from the partials and are skipped here.
pub(super) fn upload_length(ctx: &mut RequestContext) -> Validation {
    if ctx
        .parsed
        .upload_concat
        .as_ref()
        .is_some_and(crate::parsers::UploadConcat::is_final)
    {
        return Validation::Continue;
    }

    let has_length = ctx.has_header(UPLOAD_LENGTH);
    let has_defer = ctx.has_header(UPLOAD_DEFER_LENGTH);
    let defer_supported = ctx.store.supports(TusExtensions::CREATION_DEFER_LENGTH);

    match (has_length, has_defer) {
        (true, true) => Validation::bad_request(
            "Headers Upload-Length and Upload-Defer-Length are mutually exclusive and cannot be used in the same request",
        ),
        (false, false) if defer_supported => Validation::bad_request(
            "Either Headers Upload-Length or Upload-Defer-Length must be specified",
        ),
        (false, false) => Validation::bad_request("Missing Upload-Length header"),
        (false, true) if !defer_supported => {
            Validation::bad_request("Header Upload-Defer-Length is not supported")
        }
        (false, true) => {
            if ctx.header(UPLOAD_DEFER_LENGTH).map(str::trim) == Some("1") {
                ctx.parsed.defer_length = true;
                Validation::Continue
            } else {
                Validation::bad_request(
                    "Header Upload-Defer-Length must have the value '1' or be omitted",
                )
            }
        }
        (true, false) => {
            match parse_length(ctx.header(UPLOAD_LENGTH), ctx.config.max_allowed_upload_size) {
                Ok(length) => {
                    ctx.parsed.upload_length = Some(length);
                    Validation::Continue
                }
                Err(err) => length_rejection(&err),
            }
        }
    }
}

/// `Upload-Length` sent with a PATCH to an upload whose length was deferred.
pub(super) async fn upload_length_for_write_file(
    ctx: &mut RequestContext,
) -> TusResult<Validation> {
    if !ctx.has_header(UPLOAD_LENGTH) {
        return Ok(Validation::Continue);
    }

    let length = match parse_length(ctx.header(UPLOAD_LENGTH), ctx.config.max_allowed_upload_size)
    {
        Ok(length) => length,
        Err(err) => return Ok(length_rejection(&err)),
    };

    if !ctx.store.supports(TusExtensions::CREATION_DEFER_LENGTH) {
        return Ok(Validation::bad_request(
            "Header Upload-Defer-Length is not supported",
        ));
    }

    let id = ctx.file_id().to_owned();
    let core = ctx.core();
    if core
        .get_upload_length(&id, &ctx.cancellation)
        .await?
        .is_some()
    {
        return Ok(Validation::bad_request(
            "Upload-Length cannot be changed once it has been set",
        ));
    }
    let offset = core.get_upload_offset(&id, &ctx.cancellation).await?;
    if length < offset {
        return Ok(Validation::bad_request(format!(
            "Upload-Length must not be smaller than the current offset. Upload-Length: {length}, current offset: {offset}."
        )));
    }

    ctx.parsed.upload_length = Some(length);
    Ok(Validation::Continue)
}

pub(super) fn upload_offset(ctx: &mut RequestContext) -> Validation {
    let Some(value) = ctx.headers.get(UPLOAD_OFFSET) else {
        return Validation::bad_request("Missing Upload-Offset header");
    };
    let Some(offset) = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
    else {
        return Validation::bad_request("Could not parse Upload-Offset header");
    };
    match u64::try_from(offset) {
        Ok(offset) => {
            ctx.parsed.upload_offset = Some(offset);
            Validation::Continue
        }
        Err(_) => Validation::bad_request("Header Upload-Offset must be a positive number"),
    }
}

pub(super) fn upload_metadata(ctx: &mut RequestContext) -> Validation {
    if !ctx.has_header(UPLOAD_METADATA) {
        return Validation::Continue;
    }
    let raw = ctx.header(UPLOAD_METADATA).unwrap_or_default().to_owned();
    match parse_metadata(&raw, ctx.config.metadata_parsing_strategy) {
        Ok(metadata) => {
            ctx.parsed.metadata = Some(metadata);
            ctx.parsed.metadata_raw = Some(raw);
            Validation::Continue
        }
        Err(err) => Validation::bad_request(err.to_string()),
    }
}

pub(super) async fn upload_checksum(ctx: &mut RequestContext) -> TusResult<Validation> {
    let has_trailer_source = ctx.trailers.is_some();
    ctx.checksum
        .validate(&ctx.headers, has_trailer_source, &ctx.store, &ctx.cancellation)
        .await
}
