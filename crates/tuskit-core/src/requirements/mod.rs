//! Request validation.
//!
//! Each [`Requirement`] checks one aspect of a request and either lets it
//! through or stops it with a status and message. Handlers list their
//! requirements in a fixed order and [`validate_all`] stops at the first
//! failure. Requirements that decode a header store the decoded value in the
//! context so later steps do not parse it again.

mod concat;
mod file;
mod headers;

use http::StatusCode;
use tracing::trace;

use crate::context::RequestContext;
use crate::error::TusResult;

/// Why a request was stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

/// Result of one validation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Validation {
    Continue,
    Stop(Rejection),
}

impl Validation {
    pub fn stop(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Stop(Rejection {
            status,
            message: message.into(),
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::stop(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::stop(StatusCode::NOT_FOUND, "The requested upload does not exist")
    }
}

/// A single validation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requirement {
    ContentType,
    UploadLength,
    UploadLengthForWriteFile,
    UploadOffset,
    UploadMetadata,
    UploadConcatForConcatenateFiles,
    UploadConcatForWriteFile,
    UploadChecksum,
    FileExist,
    FileHasNotExpired,
    RequestOffsetMatchesFileOffset,
    FileIsNotCompleted,
}

impl Requirement {
    pub async fn validate(self, ctx: &mut RequestContext) -> TusResult<Validation> {
        match self {
            Self::ContentType => Ok(headers::content_type(ctx)),
            Self::UploadLength => Ok(headers::upload_length(ctx)),
            Self::UploadLengthForWriteFile => headers::upload_length_for_write_file(ctx).await,
            Self::UploadOffset => Ok(headers::upload_offset(ctx)),
            Self::UploadMetadata => Ok(headers::upload_metadata(ctx)),
            Self::UploadChecksum => headers::upload_checksum(ctx).await,
            Self::UploadConcatForConcatenateFiles => {
                concat::upload_concat_for_concatenate_files(ctx).await
            }
            Self::UploadConcatForWriteFile => file::upload_concat_for_write_file(ctx).await,
            Self::FileExist => file::file_exist(ctx).await,
            Self::FileHasNotExpired => file::file_has_not_expired(ctx).await,
            Self::RequestOffsetMatchesFileOffset => {
                file::request_offset_matches_file_offset(ctx).await
            }
            Self::FileIsNotCompleted => file::file_is_not_completed(ctx).await,
        }
    }
}

/// Run `requirements` in order and stop at the first failure.
pub(crate) async fn validate_all(
    requirements: &[Requirement],
    ctx: &mut RequestContext,
) -> TusResult<Validation> {
    for requirement in requirements {
        if let Validation::Stop(rejection) = requirement.validate(ctx).await? {
            trace!(
                requirement = ?requirement,
                status = %rejection.status,
                message = %rejection.message,
                "requirement failed"
            );
            return Ok(Validation::Stop(rejection));
        }
    }
    Ok(Validation::Continue)
}
