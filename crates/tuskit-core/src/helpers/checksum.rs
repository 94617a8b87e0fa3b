//! Checksum negotiation and verification for one request.
//!
//! ```text
//! NoChecksum --header--> HeaderParsed --+--> AlgorithmSupported --append--> Verified | Mismatch
//!            \                          +--> AlgorithmUnsupported (400)
//!             --Trailer: Upload-Checksum--> TrailerDeclared --append--> Verified | Mismatch
//! ```
//!
//! A declared trailer that cannot be read is replaced by
//! [`Checksum::sentinel`], which the store will never match, so the chunk is
//! discarded instead of being accepted unverified.

use http::{HeaderMap, StatusCode, header};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cancellation::CancellationSignal;
use crate::error::TusResult;
use crate::headers::{UPLOAD_CHECKSUM, UPLOAD_CHECKSUM_NAME, checksum_mismatch_status};
use crate::parsers::Checksum;
use crate::requirements::Validation;
use crate::store::{StoreAdapter, TusExtensions};

const MISMATCH_MESSAGE: &str = "Header Upload-Checksum does not match the checksum of the file";

/// Where the helper is in the checksum state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum ChecksumState {
    #[default]
    NoChecksum,
    HeaderParsed(Checksum),
    AlgorithmSupported(Checksum),
    AlgorithmUnsupported(String),
    TrailerDeclared,
    Verified,
    Mismatch,
}

#[derive(Debug, Default)]
pub(crate) struct ChecksumHelper {
    state: ChecksumState,
    supported: Option<Vec<String>>,
}

impl ChecksumHelper {
    pub fn state(&self) -> &ChecksumState {
        &self.state
    }

    /// Whether a checksum has to be verified after the append.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            ChecksumState::AlgorithmSupported(_) | ChecksumState::TrailerDeclared
        )
    }

    /// Algorithms the store verifies, loaded once per request.
    pub async fn supported_algorithms(
        &mut self,
        store: &StoreAdapter,
        cancel: &CancellationSignal,
    ) -> TusResult<&[String]> {
        if self.supported.is_none() {
            let algorithms = store.checksum()?.supported_algorithms(cancel).await?;
            self.supported = Some(algorithms);
        }
        Ok(self.supported.as_deref().unwrap_or_default())
    }

    /// Check the request's checksum headers before any data is read.
    pub async fn validate(
        &mut self,
        headers: &HeaderMap,
        has_trailer_source: bool,
        store: &StoreAdapter,
        cancel: &CancellationSignal,
    ) -> TusResult<Validation> {
        if !store.supports(TusExtensions::CHECKSUM) {
            return Ok(Validation::Continue);
        }

        let leading = headers.get(UPLOAD_CHECKSUM);
        let trailer_declared = declares_checksum_trailer(headers);

        if leading.is_some() && trailer_declared {
            return Ok(Validation::bad_request(
                "Headers Upload-Checksum and trailing header Upload-Checksum are mutually exclusive",
            ));
        }

        if trailer_declared {
            if !has_trailer_source || !store.supports(TusExtensions::CHECKSUM_TRAILER) {
                return Ok(Validation::bad_request(
                    "Trailing header Upload-Checksum is not supported",
                ));
            }
            self.state = ChecksumState::TrailerDeclared;
            return Ok(Validation::Continue);
        }

        let Some(leading) = leading else {
            return Ok(Validation::Continue);
        };

        let checksum = Checksum::parse(leading.to_str().unwrap_or_default());
        if !checksum.is_valid() {
            return Ok(Validation::bad_request("Could not parse Upload-Checksum header"));
        }
        self.state = ChecksumState::HeaderParsed(checksum.clone());

        let supported = self.supported_algorithms(store, cancel).await?;
        if supported
            .iter()
            .any(|alg| alg.eq_ignore_ascii_case(checksum.algorithm()))
        {
            self.state = ChecksumState::AlgorithmSupported(checksum);
            Ok(Validation::Continue)
        } else {
            let message = format!(
                "Unsupported checksum algorithm. Supported algorithms are: {}",
                supported.join(",")
            );
            self.state = ChecksumState::AlgorithmUnsupported(checksum.algorithm().to_owned());
            Ok(Validation::bad_request(message))
        }
    }

    /// Verify the appended chunk, resolving a declared trailer first.
    pub async fn verify(
        &mut self,
        store: &StoreAdapter,
        upload_id: &str,
        trailers: Option<oneshot::Receiver<HeaderMap>>,
        cancel: &CancellationSignal,
    ) -> TusResult<Validation> {
        let checksum = match std::mem::take(&mut self.state) {
            ChecksumState::AlgorithmSupported(checksum) => checksum,
            ChecksumState::TrailerDeclared => {
                let trailer = read_trailer(trailers, cancel).await;
                self.usable_or_sentinel(trailer, store, cancel).await?
            }
            other => {
                self.state = other;
                return Ok(Validation::Continue);
            }
        };

        let matches = store
            .checksum()?
            .verify_checksum(upload_id, checksum.algorithm(), checksum.hash(), cancel)
            .await?;

        if matches {
            debug!(upload_id = %upload_id, algorithm = checksum.algorithm(), "checksum verified");
            self.state = ChecksumState::Verified;
            Ok(Validation::Continue)
        } else {
            debug!(
                upload_id = %upload_id,
                algorithm = checksum.algorithm(),
                sentinel = checksum.is_sentinel(),
                "checksum mismatch, chunk discarded"
            );
            self.state = ChecksumState::Mismatch;
            Ok(Validation::stop(checksum_mismatch_status(), MISMATCH_MESSAGE))
        }
    }

    async fn usable_or_sentinel(
        &mut self,
        trailer: Option<Checksum>,
        store: &StoreAdapter,
        cancel: &CancellationSignal,
    ) -> TusResult<Checksum> {
        let Some(trailer) = trailer else {
            return Ok(Checksum::sentinel());
        };
        let supported = self.supported_algorithms(store, cancel).await?;
        if supported
            .iter()
            .any(|alg| alg.eq_ignore_ascii_case(trailer.algorithm()))
        {
            Ok(trailer)
        } else {
            warn!(
                algorithm = trailer.algorithm(),
                "trailing checksum uses an unsupported algorithm"
            );
            Ok(Checksum::sentinel())
        }
    }
}

/// Whether the `Trailer` header lists `Upload-Checksum`.
fn declares_checksum_trailer(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TRAILER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|name| name.trim().eq_ignore_ascii_case(UPLOAD_CHECKSUM_NAME))
}

/// Wait for the trailing `Upload-Checksum`. Anything short of a parsable
/// value yields `None`.
async fn read_trailer(
    trailers: Option<oneshot::Receiver<HeaderMap>>,
    cancel: &CancellationSignal,
) -> Option<Checksum> {
    let receiver = trailers?;
    let trailers = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("request cancelled before trailers arrived");
            return None;
        }
        res = receiver => match res {
            Ok(trailers) => trailers,
            Err(_) => {
                debug!("trailer sender dropped");
                return None;
            }
        },
    };

    let checksum = Checksum::parse(trailers.get(UPLOAD_CHECKSUM)?.to_str().ok()?);
    checksum.is_valid().then_some(checksum)
}
