//! Intent classification.
//!
//! Decides what a request wants from the engine before anything is
//! validated. A request maps to one intent, or to the ordered pair
//! `[CreateFile | ConcatenateFiles, WriteFile]` for creation-with-upload.
//! Requests the engine should not touch map to [`Intent::NotApplicable`].

use std::fmt;

use http::{HeaderMap, Method, header};
use tracing::trace;

use crate::config::TusConfig;
use crate::headers::{OFFSET_OCTET_STREAM, TUS_RESUMABLE, UPLOAD_CONCAT, X_HTTP_METHOD_OVERRIDE};
use crate::store::{StoreAdapter, TusExtensions};

/// What a request asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// `POST` to the base path.
    CreateFile,
    /// `PATCH` to an upload.
    WriteFile,
    /// `DELETE` of an upload.
    DeleteFile,
    /// `HEAD` of an upload.
    GetFileInfo,
    /// `OPTIONS` on the base path.
    GetOptions,
    /// `POST` with `Upload-Concat`.
    ConcatenateFiles,
    /// Not a tus request.
    NotApplicable,
}

/// Whether an intent runs under the per-upload lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
    /// The upload is locked while the handler runs.
    RequiresLock,
    /// The handler runs without locking.
    NoLock,
}

impl Intent {
    /// Locking needs of the intent.
    #[must_use]
    pub fn lock_type(self) -> LockType {
        match self {
            Self::WriteFile | Self::DeleteFile => LockType::RequiresLock,
            _ => LockType::NoLock,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateFile => "create-file",
            Self::WriteFile => "write-file",
            Self::DeleteFile => "delete-file",
            Self::GetFileInfo => "get-file-info",
            Self::GetOptions => "get-options",
            Self::ConcatenateFiles => "concatenate-files",
            Self::NotApplicable => "not-applicable",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method after applying `X-HTTP-Method-Override`.
#[must_use]
pub fn effective_method(method: &Method, headers: &HeaderMap) -> Method {
    headers
        .get(X_HTTP_METHOD_OVERRIDE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Method::from_bytes(v.trim().to_ascii_uppercase().as_bytes()).ok())
        .unwrap_or_else(|| method.clone())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathMatch {
    Base,
    Upload(String),
    Other,
}

fn match_path(path: &str, url_path: &str) -> PathMatch {
    let base = url_path.trim_end_matches('/');
    let path = path.trim_end_matches('/');

    if path.eq_ignore_ascii_case(base) {
        return PathMatch::Base;
    }
    let prefix_matches = path
        .get(..base.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(base));
    if !prefix_matches {
        return PathMatch::Other;
    }
    match path[base.len()..].strip_prefix('/') {
        Some(id) if !id.is_empty() && !id.contains('/') => PathMatch::Upload(id.to_owned()),
        _ => PathMatch::Other,
    }
}

/// Upload id addressed by `path`, if it points at an upload under `url_path`.
///
/// # Examples
///
/// ```
/// use tuskit_core::intent::upload_id_from_path;
///
/// assert_eq!(upload_id_from_path("/files/abc/", "/files"), Some("abc".to_owned()));
/// assert_eq!(upload_id_from_path("/files", "/files"), None);
/// ```
#[must_use]
pub fn upload_id_from_path(path: &str, url_path: &str) -> Option<String> {
    match match_path(path, url_path) {
        PathMatch::Upload(id) => Some(id),
        PathMatch::Base | PathMatch::Other => None,
    }
}

/// Classify a request. `method` must already have overrides applied (see
/// [`effective_method`]). The result is never empty.
#[must_use]
pub fn determine_intents(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    store: &StoreAdapter,
    config: &TusConfig,
) -> Vec<Intent> {
    let intents = classify(method, path, headers, store, config);
    trace!(method = %method, path = %path, intents = ?intents, "classified request");
    intents
}

fn classify(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    store: &StoreAdapter,
    config: &TusConfig,
) -> Vec<Intent> {
    if *method != Method::OPTIONS && !headers.contains_key(TUS_RESUMABLE) {
        return vec![Intent::NotApplicable];
    }

    let location = match_path(path, &config.url_path);
    let on_base = location == PathMatch::Base;
    let on_upload = matches!(location, PathMatch::Upload(_));

    let primary = match *method {
        Method::POST if on_base => {
            if headers.contains_key(UPLOAD_CONCAT)
                && store.supports(TusExtensions::CONCATENATION)
            {
                Intent::ConcatenateFiles
            } else if store.supports(TusExtensions::CREATION) {
                Intent::CreateFile
            } else {
                Intent::NotApplicable
            }
        }
        Method::PATCH if on_upload => Intent::WriteFile,
        Method::DELETE if on_upload && store.supports(TusExtensions::TERMINATION) => {
            Intent::DeleteFile
        }
        Method::HEAD if on_upload => Intent::GetFileInfo,
        Method::OPTIONS if on_base => Intent::GetOptions,
        _ => Intent::NotApplicable,
    };

    let mut intents = vec![primary];
    if matches!(primary, Intent::CreateFile | Intent::ConcatenateFiles)
        && store.supports(TusExtensions::CREATION_WITH_UPLOAD)
        && has_upload_body(headers)
    {
        intents.push(Intent::WriteFile);
    }
    intents
}

fn has_upload_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(OFFSET_OCTET_STREAM))
}
