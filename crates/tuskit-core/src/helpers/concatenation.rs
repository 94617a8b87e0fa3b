//! Concatenation checks shared by the concatenate, write and info paths.

use http::StatusCode;

use crate::cancellation::CancellationSignal;
use crate::error::TusResult;
use crate::parsers::UploadConcat;
use crate::requirements::Validation;
use crate::store::{StoreAdapter, TusExtensions};

/// Concatenation role of an upload, or [`UploadConcat::None`] when the
/// extension is unavailable.
pub(crate) async fn upload_concat_of(
    store: &StoreAdapter,
    upload_id: &str,
    cancel: &CancellationSignal,
) -> TusResult<UploadConcat> {
    if !store.supports(TusExtensions::CONCATENATION) {
        return Ok(UploadConcat::None);
    }
    store
        .concatenation()?
        .get_upload_concat(upload_id, cancel)
        .await
}

/// Check that every upload referenced by a final upload exists, is partial
/// and is complete, and that together they fit under `max_size`.
pub(crate) async fn validate_final_parts(
    store: &StoreAdapter,
    partial_ids: &[String],
    max_size: Option<u64>,
    cancel: &CancellationSignal,
) -> TusResult<Validation> {
    let core = store.core();

    for id in partial_ids {
        if !core.file_exists(id, cancel).await? {
            return Ok(Validation::bad_request(
                "Could not find some of the files supplied for concatenation",
            ));
        }
    }

    for id in partial_ids {
        if !upload_concat_of(store, id, cancel).await?.is_partial() {
            return Ok(Validation::bad_request(
                "Some of the files supplied for concatenation are not marked as partial and can not be concatenated",
            ));
        }
    }

    let mut total = 0u64;
    for id in partial_ids {
        let length = core.get_upload_length(id, cancel).await?;
        let offset = core.get_upload_offset(id, cancel).await?;
        match length {
            Some(length) if length == offset => total = total.saturating_add(length),
            _ => {
                return Ok(Validation::bad_request(
                    "Some of the files supplied for concatenation are not finished and can not be concatenated",
                ));
            }
        }
    }

    if max_size.is_some_and(|max| total > max) {
        return Ok(Validation::stop(
            StatusCode::PAYLOAD_TOO_LARGE,
            "The concatenated file exceeds the server's max file size.",
        ));
    }

    Ok(Validation::Continue)
}
