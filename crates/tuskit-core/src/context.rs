//! Protocol-neutral request and response types.
//!
//! A host adapter builds a [`TusRequest`] from its framework's request, hands
//! it to [`TusProtocol::invoke`](crate::runner::TusProtocol::invoke) and
//! translates the returned [`ProtocolOutcome`] back. Inside the engine the
//! request is unpacked into a [`RequestContext`] that handlers, requirements
//! and helpers share for the lifetime of one exchange.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use http::header::AsHeaderName;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tokio::io::AsyncRead;
use tokio::sync::oneshot;

use crate::cancellation::CancellationSignal;
use crate::config::TusConfig;
use crate::helpers::checksum::ChecksumHelper;
use crate::parsers::{MetadataMap, UploadConcat};
use crate::store::{StoreAdapter, TusStore};

/// The request body as an async byte reader.
pub type RequestBody = Pin<Box<dyn AsyncRead + Send>>;

// ---------------------------------------------------------------------------
// TusRequest
// ---------------------------------------------------------------------------

/// One incoming HTTP exchange, as seen by the engine.
pub struct TusRequest {
    /// HTTP method as sent (overrides are resolved by the engine).
    pub method: Method,
    /// Request path, without query string.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
    /// Trailing headers, delivered once the body has been read. `None` when
    /// the transport cannot deliver trailers.
    pub trailers: Option<oneshot::Receiver<HeaderMap>>,
    /// Cancelled by the host when the client goes away.
    pub cancellation: CancellationSignal,
}

impl fmt::Debug for TusRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TusRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("has_trailers", &self.trailers.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TusRequest {
    /// Create a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Box::pin(tokio::io::empty()),
            trailers: None,
            cancellation: CancellationSignal::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl AsyncRead + Send + 'static) -> Self {
        self.body = Box::pin(body);
        self
    }

    /// Attach a trailing-header source.
    #[must_use]
    pub fn with_trailers(mut self, trailers: oneshot::Receiver<HeaderMap>) -> Self {
        self.trailers = Some(trailers);
        self
    }

    /// Use the given cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationSignal) -> Self {
        self.cancellation = cancellation;
        self
    }
}

// ---------------------------------------------------------------------------
// TusResponse
// ---------------------------------------------------------------------------

/// The response the engine wants the host to send.
#[derive(Debug, Clone, Default)]
pub struct TusResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Plain-text body, if any.
    pub message: Option<String>,
}

impl TusResponse {
    /// A response with the given status and nothing else.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Header value as a string, if present and valid ASCII.
    #[must_use]
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn set_header(&mut self, name: HeaderName, value: impl fmt::Display) {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            self.headers.insert(name, value);
        }
    }
}

/// What the host should do after the engine has seen a request.
#[derive(Debug)]
pub enum ProtocolOutcome {
    /// Not a tus request; the host should keep processing it.
    ContinueExecution(TusRequest),
    /// The engine handled the request; send this response.
    StopExecution(TusResponse),
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Header values decoded by the requirement pipeline.
#[derive(Debug, Default)]
pub(crate) struct ParsedHeaders {
    pub upload_length: Option<u64>,
    pub defer_length: bool,
    pub upload_offset: Option<u64>,
    pub metadata: Option<MetadataMap>,
    pub metadata_raw: Option<String>,
    pub upload_concat: Option<UploadConcat>,
}

/// Per-request state shared by requirements, helpers and handlers.
pub(crate) struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub trailers: Option<oneshot::Receiver<HeaderMap>>,
    pub cancellation: CancellationSignal,
    pub upload_id: Option<String>,
    pub response: TusResponse,
    pub parsed: ParsedHeaders,
    pub checksum: ChecksumHelper,
    pub store: Arc<StoreAdapter>,
    pub config: Arc<TusConfig>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("upload_id", &self.upload_id)
            .field("response", &self.response)
            .field("parsed", &self.parsed)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    pub fn new(
        request: TusRequest,
        method: Method,
        upload_id: Option<String>,
        store: Arc<StoreAdapter>,
        config: Arc<TusConfig>,
    ) -> Self {
        Self {
            method,
            path: request.path,
            headers: request.headers,
            body: request.body,
            trailers: request.trailers,
            cancellation: request.cancellation,
            upload_id,
            response: TusResponse::default(),
            parsed: ParsedHeaders::default(),
            checksum: ChecksumHelper::default(),
            store,
            config,
        }
    }

    /// Header value as a string. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// Upload id from the request path, or `""` for base-path requests.
    pub fn file_id(&self) -> &str {
        self.upload_id.as_deref().unwrap_or_default()
    }

    pub fn core(&self) -> &dyn TusStore {
        self.store.core()
    }

    /// Stop with the given status and message.
    pub fn fail(&mut self, status: StatusCode, message: impl Into<String>) {
        self.response.status = status;
        self.response.message = Some(message.into());
    }

    /// Prepare the context for the trailing write of a creation-with-upload
    /// request: point it at the created upload and forget per-intent state.
    pub fn continue_with_upload(&mut self, upload_id: String) {
        self.headers.remove(crate::headers::UPLOAD_LENGTH);
        self.headers
            .insert(crate::headers::UPLOAD_OFFSET, HeaderValue::from_static("0"));
        self.upload_id = Some(upload_id);
        self.response = TusResponse::default();
        self.parsed = ParsedHeaders::default();
        self.checksum = ChecksumHelper::default();
    }
}
