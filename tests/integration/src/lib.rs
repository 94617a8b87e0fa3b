//! End-to-end protocol tests for the tuskit engine.
//!
//! Every test drives a [`TusProtocol`] bound to an in-memory store through
//! `invoke`, the same way a host adapter would. No server is needed.
//!
//! Run them with:
//! ```text
//! cargo test -p tuskit-integration
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderName, HeaderValue, Method, StatusCode, header};
use parking_lot::Mutex;
use tuskit_core::cancellation::CancellationSignal;
use tuskit_core::checksums::{ChecksumAlgorithm, compute_checksum};
use tuskit_core::context::RequestBody;
use tuskit_core::headers::{TUS_RESUMABLE, UPLOAD_LENGTH, UPLOAD_OFFSET};
use tuskit_core::store::{ChecksumStore, CreationStore};
use tuskit_core::{
    EventOutcome, Events, InMemoryStore, ProtocolOutcome, TusConfig, TusProtocol, TusRequest,
    TusResponse, TusResult, TusStore,
};

mod test_concat;
mod test_creation;
mod test_expiration;
mod test_options;
mod test_write;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// An engine over a fresh [`InMemoryStore`].
#[must_use]
pub fn protocol(config: TusConfig) -> TusProtocol {
    init_tracing();
    TusProtocol::new(Arc::new(InMemoryStore::new()), config)
}

/// A request carrying `Tus-Resumable: 1.0.0`.
#[must_use]
pub fn tus_request(method: Method, path: &str) -> TusRequest {
    TusRequest::new(method, path).with_header(TUS_RESUMABLE, HeaderValue::from_static("1.0.0"))
}

/// Add a header given as text.
#[must_use]
pub fn with(request: TusRequest, name: HeaderName, value: &str) -> TusRequest {
    request.with_header(name, HeaderValue::from_str(value).expect("valid header value"))
}

/// A PATCH appending `body` at `offset`.
#[must_use]
pub fn patch(upload_id: &str, offset: u64, body: impl tokio::io::AsyncRead + Send + 'static) -> TusRequest {
    let request = tus_request(Method::PATCH, &format!("/files/{upload_id}"))
        .with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/offset+octet-stream"),
        )
        .with_body(body);
    with(request, UPLOAD_OFFSET, &offset.to_string())
}

/// Invoke the engine and expect it to answer.
pub async fn respond(protocol: &TusProtocol, request: TusRequest) -> TusResponse {
    match protocol.invoke(request).await.expect("engine invoke") {
        ProtocolOutcome::StopExecution(response) => response,
        ProtocolOutcome::ContinueExecution(request) => {
            panic!("engine passed through {} {}", request.method, request.path)
        }
    }
}

/// Create an upload of `length` bytes and return its id.
pub async fn create_upload(protocol: &TusProtocol, length: u64) -> String {
    let request = with(
        tus_request(Method::POST, "/files"),
        UPLOAD_LENGTH,
        &length.to_string(),
    );
    let response = respond(protocol, request).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.message);
    upload_id(&response)
}

/// Upload id from a creation response's `Location`.
#[must_use]
pub fn upload_id(response: &TusResponse) -> String {
    response
        .header(header::LOCATION)
        .and_then(|location| location.rsplit('/').next())
        .expect("location header")
        .to_owned()
}

/// `Upload-Offset` reported by a HEAD request.
pub async fn offset_of(protocol: &TusProtocol, upload_id: &str) -> u64 {
    let response = respond(
        protocol,
        tus_request(Method::HEAD, &format!("/files/{upload_id}")),
    )
    .await;
    response
        .header(UPLOAD_OFFSET)
        .and_then(|v| v.parse().ok())
        .expect("upload offset")
}

/// `Upload-Checksum` value for `data`.
#[must_use]
pub fn checksum_header(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    format!(
        "{algorithm} {}",
        STANDARD.encode(compute_checksum(algorithm, data))
    )
}

/// Hooks that count file-complete notifications.
#[must_use]
pub fn counting_file_complete() -> (Events, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let events = Events::new().on_file_complete(move |_| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            EventOutcome::proceed()
        }
    });
    (events, count)
}

// ---------------------------------------------------------------------------
// RecordingStore
// ---------------------------------------------------------------------------

/// Creation + checksum store that records every checksum it is asked to
/// verify.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    verified: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(algorithm, hash)` pairs passed to `verify_checksum`, in order.
    #[must_use]
    pub fn verified(&self) -> Vec<(String, Vec<u8>)> {
        self.verified.lock().clone()
    }
}

#[async_trait]
impl TusStore for RecordingStore {
    async fn append_data(
        &self,
        upload_id: &str,
        body: &mut RequestBody,
        cancel: &CancellationSignal,
    ) -> TusResult<u64> {
        self.inner.append_data(upload_id, body, cancel).await
    }

    async fn file_exists(&self, upload_id: &str, cancel: &CancellationSignal) -> TusResult<bool> {
        self.inner.file_exists(upload_id, cancel).await
    }

    async fn get_upload_length(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<u64>> {
        self.inner.get_upload_length(upload_id, cancel).await
    }

    async fn get_upload_offset(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<u64> {
        self.inner.get_upload_offset(upload_id, cancel).await
    }

    async fn get_upload_metadata(
        &self,
        upload_id: &str,
        cancel: &CancellationSignal,
    ) -> TusResult<Option<String>> {
        self.inner.get_upload_metadata(upload_id, cancel).await
    }

    fn creation(&self) -> Option<&dyn CreationStore> {
        Some(self)
    }

    fn checksum(&self) -> Option<&dyn ChecksumStore> {
        Some(self)
    }
}

#[async_trait]
impl CreationStore for RecordingStore {
    async fn create_file(
        &self,
        upload_length: Option<u64>,
        metadata: Option<&str>,
        cancel: &CancellationSignal,
    ) -> TusResult<String> {
        self.inner.create_file(upload_length, metadata, cancel).await
    }
}

#[async_trait]
impl ChecksumStore for RecordingStore {
    async fn supported_algorithms(&self, cancel: &CancellationSignal) -> TusResult<Vec<String>> {
        self.inner.supported_algorithms(cancel).await
    }

    async fn verify_checksum(
        &self,
        upload_id: &str,
        algorithm: &str,
        hash: &[u8],
        cancel: &CancellationSignal,
    ) -> TusResult<bool> {
        self.verified
            .lock()
            .push((algorithm.to_owned(), hash.to_vec()));
        self.inner
            .verify_checksum(upload_id, algorithm, hash, cancel)
            .await
    }
}
