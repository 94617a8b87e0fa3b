//! `Upload-Concat` parsing and formatting.
//!
//! Accepted values are `partial` and `final;<url> <url> ...`. Final URLs may
//! be absolute (`https://host/files/abc`) or relative (`/files/abc`); either
//! way the path must live directly under the configured base path, and the
//! last segment is the upload id.

use http::Uri;

/// Concatenation role of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadConcat {
    /// Not part of a concatenation.
    #[default]
    None,
    /// A partial upload that may later be merged into a final upload.
    Partial,
    /// A final upload built from the listed partial upload ids, in order.
    Final(Vec<String>),
}

impl UploadConcat {
    /// Whether this is a partial upload.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial)
    }

    /// Whether this is a final upload.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    /// Format as an `Upload-Concat` header value, or `None` for
    /// [`UploadConcat::None`]. Final ids are expanded to upload URLs under
    /// `url_path`.
    #[must_use]
    pub fn to_header_value(&self, url_path: &str) -> Option<String> {
        match self {
            Self::None => None,
            Self::Partial => Some("partial".to_owned()),
            Self::Final(ids) => {
                let base = url_path.trim_end_matches('/');
                let urls = ids
                    .iter()
                    .map(|id| format!("{base}/{id}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(format!("final;{urls}"))
            }
        }
    }
}

/// Error returned when `Upload-Concat` cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadConcatParseError {
    /// The value is neither `partial` nor `final;...`.
    #[error(
        "Header Upload-Concat: Header is invalid. Valid values are \"partial\" and \"final\" followed by a list of file urls to concatenate"
    )]
    InvalidValue,
    /// A final value listed no URLs.
    #[error("Header Upload-Concat: Final upload must reference at least one partial upload")]
    EmptyFinal,
    /// A URL could not be parsed or does not point to an upload under the base path.
    #[error("Header Upload-Concat: {0} is not a valid upload url")]
    InvalidUrl(String),
}

/// Parse an `Upload-Concat` header value against the configured base path.
///
/// # Examples
///
/// ```
/// use tuskit_core::parsers::upload_concat::{UploadConcat, parse_upload_concat};
///
/// let concat = parse_upload_concat("final;/files/a https://example.com/files/b", "/files").unwrap();
/// assert_eq!(concat, UploadConcat::Final(vec!["a".into(), "b".into()]));
/// ```
pub fn parse_upload_concat(
    header: &str,
    url_path: &str,
) -> Result<UploadConcat, UploadConcatParseError> {
    let header = header.trim();
    if header.eq_ignore_ascii_case("partial") {
        return Ok(UploadConcat::Partial);
    }

    let Some((kind, urls)) = header.split_once(';') else {
        return Err(UploadConcatParseError::InvalidValue);
    };
    if !kind.trim().eq_ignore_ascii_case("final") {
        return Err(UploadConcatParseError::InvalidValue);
    }

    let ids = urls
        .split_whitespace()
        .map(|url| upload_id_from_url(url, url_path))
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(UploadConcatParseError::EmptyFinal);
    }

    Ok(UploadConcat::Final(ids))
}

fn upload_id_from_url(url: &str, url_path: &str) -> Result<String, UploadConcatParseError> {
    let invalid = || UploadConcatParseError::InvalidUrl(url.to_owned());

    let uri: Uri = url.parse().map_err(|_| invalid())?;
    let path = uri.path();
    let base = url_path.trim_end_matches('/');

    if path.len() <= base.len() || !path[..base.len()].eq_ignore_ascii_case(base) {
        return Err(invalid());
    }
    let rest = &path[base.len()..];
    if !rest.starts_with('/') {
        return Err(invalid());
    }

    let id = rest.trim_matches('/');
    if id.is_empty() || id.contains('/') {
        return Err(invalid());
    }
    Ok(id.to_owned())
}
