//! The protocol runner.
//!
//! [`TusProtocol`] is the engine's entry point. For each request it classifies
//! the intents, then drives every handler through the same sequence:
//!
//! ```text
//! authorize -> version check -> lock -> requirements -> before hook
//!           -> store action -> after hooks -> unlock
//! ```
//!
//! Creation-with-upload requests run a second handler (the write) only when
//! the first one created the upload, and merge both responses.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationSignal;
use crate::config::TusConfig;
use crate::context::{ProtocolOutcome, RequestContext, TusRequest, TusResponse};
use crate::error::{TusError, TusResult};
use crate::events::{AuthorizeContext, EventOutcome, Events};
use crate::handlers::IntentHandler;
use crate::headers::{
    TUS_RESUMABLE, TUS_RESUMABLE_VALUE, TUS_VERSION, TUS_VERSION_VALUE, UPLOAD_EXPIRES,
    UPLOAD_OFFSET,
};
use crate::intent::{
    Intent, LockType, determine_intents, effective_method, upload_id_from_path,
};
use crate::lock::{FileLockGuard, FileLockProvider, InMemoryFileLockProvider};
use crate::requirements::{Validation, validate_all};
use crate::store::{StoreAdapter, TusStore};

/// A tus protocol engine bound to one store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use http::{HeaderValue, Method, StatusCode};
/// use tuskit_core::config::TusConfig;
/// use tuskit_core::context::{ProtocolOutcome, TusRequest};
/// use tuskit_core::headers::{TUS_RESUMABLE, UPLOAD_LENGTH};
/// use tuskit_core::runner::TusProtocol;
/// use tuskit_core::store::InMemoryStore;
///
/// # tokio_test::block_on(async {
/// let protocol = TusProtocol::new(Arc::new(InMemoryStore::new()), TusConfig::default());
/// let request = TusRequest::new(Method::POST, "/files")
///     .with_header(TUS_RESUMABLE, HeaderValue::from_static("1.0.0"))
///     .with_header(UPLOAD_LENGTH, HeaderValue::from_static("100"));
///
/// let ProtocolOutcome::StopExecution(response) = protocol.invoke(request).await.unwrap() else {
///     panic!("not handled");
/// };
/// assert_eq!(response.status, StatusCode::CREATED);
/// assert!(response.header("location").unwrap().starts_with("/files/"));
/// # });
/// ```
#[derive(Debug)]
pub struct TusProtocol {
    store: Arc<StoreAdapter>,
    config: Arc<TusConfig>,
    events: Events,
    locks: Arc<dyn FileLockProvider>,
}

impl TusProtocol {
    /// Bind `store` with the given configuration, no hooks and the
    /// in-process lock provider.
    #[must_use]
    pub fn new(store: Arc<dyn TusStore>, config: TusConfig) -> Self {
        let adapter = StoreAdapter::new(store, config.allowed_extensions);
        Self {
            store: Arc::new(adapter),
            config: Arc::new(config),
            events: Events::default(),
            locks: Arc::new(InMemoryFileLockProvider::new()),
        }
    }

    /// Use the given lifecycle hooks.
    #[must_use]
    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    /// Use a different lock provider.
    #[must_use]
    pub fn with_lock_provider(mut self, locks: Arc<dyn FileLockProvider>) -> Self {
        self.locks = locks;
        self
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &TusConfig {
        &self.config
    }

    /// The bound store and its negotiated capabilities.
    #[must_use]
    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    /// Handle one request.
    ///
    /// Returns [`ProtocolOutcome::ContinueExecution`] with the untouched
    /// request when it is not a tus request. Errors are unexpected failures
    /// the host should answer with a 500; protocol violations and store
    /// rejections are responses, not errors.
    pub async fn invoke(&self, request: TusRequest) -> TusResult<ProtocolOutcome> {
        let method = effective_method(&request.method, &request.headers);
        let intents = determine_intents(
            &method,
            &request.path,
            &request.headers,
            &self.store,
            &self.config,
        );
        let Some(first) = intents.first().copied().and_then(IntentHandler::for_intent) else {
            return Ok(ProtocolOutcome::ContinueExecution(request));
        };

        let upload_id = upload_id_from_path(&request.path, &self.config.url_path);
        let mut ctx = RequestContext::new(
            request,
            method,
            upload_id,
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        );

        self.run(first, &mut ctx).await?;
        let mut response = std::mem::take(&mut ctx.response);

        if let Some(second) = intents.get(1).copied().and_then(IntentHandler::for_intent) {
            if response.status == StatusCode::CREATED {
                if let Some(created) = ctx.upload_id.clone() {
                    self.run_trailing_write(second, &mut ctx, created, &mut response)
                        .await;
                }
            }
        }

        Ok(ProtocolOutcome::StopExecution(response))
    }

    /// Ask the store to delete expired uploads. Returns how many were removed.
    pub async fn remove_expired_uploads(&self, cancel: &CancellationSignal) -> TusResult<usize> {
        let removed = self.store.expiration()?.remove_expired_files(cancel).await?;
        info!(removed, "removed expired uploads");
        Ok(removed)
    }

    async fn run_trailing_write(
        &self,
        handler: IntentHandler,
        ctx: &mut RequestContext,
        upload_id: String,
        response: &mut TusResponse,
    ) {
        ctx.continue_with_upload(upload_id);
        match self.run(handler, ctx).await {
            Ok(()) => {
                for name in [UPLOAD_OFFSET, UPLOAD_EXPIRES] {
                    if let Some(value) = ctx.response.headers.get(&name) {
                        response.headers.insert(name.clone(), value.clone());
                    }
                }
                if ctx.response.status.is_client_error() {
                    debug!(
                        upload_id = %ctx.file_id(),
                        status = %ctx.response.status,
                        message = ?ctx.response.message,
                        "upload data was not accepted"
                    );
                }
            }
            Err(err) => {
                warn!(upload_id = %ctx.file_id(), error = %err, "failed to write upload data");
            }
        }
    }

    /// Drive one handler. The outcome is left in `ctx.response`.
    async fn run(&self, handler: IntentHandler, ctx: &mut RequestContext) -> TusResult<()> {
        let intent = handler.intent();

        let authorized = self
            .events
            .authorize(|| AuthorizeContext {
                intent,
                method: ctx.method.clone(),
                upload_id: ctx.upload_id.clone(),
                headers: ctx.headers.clone(),
            })
            .await;
        if authorized.has_failed() {
            debug!(intent = %intent, "request not authorized");
            ctx.response = failure_response(&authorized);
            return Ok(());
        }

        ctx.response.set_header(TUS_RESUMABLE, TUS_RESUMABLE_VALUE);

        if intent != Intent::GetOptions {
            let version = ctx.header(TUS_RESUMABLE).unwrap_or_default().to_owned();
            if version != TUS_RESUMABLE_VALUE {
                ctx.response.set_header(TUS_VERSION, TUS_VERSION_VALUE);
                ctx.fail(
                    StatusCode::PRECONDITION_FAILED,
                    format!("Tus-Resumable header must be {TUS_RESUMABLE_VALUE} but was {version}"),
                );
                return Ok(());
            }
        }

        let guard = if intent.lock_type() == LockType::RequiresLock {
            let upload_id = ctx.file_id().to_owned();
            match self.locks.acquire(&upload_id).await? {
                Some(token) => Some(FileLockGuard::new(Arc::clone(&self.locks), token)),
                None => {
                    ctx.fail(
                        StatusCode::CONFLICT,
                        format!(
                            "File {upload_id} is currently being updated. Please try again later"
                        ),
                    );
                    return Ok(());
                }
            }
        } else {
            None
        };

        let result = match self.execute(handler, ctx).await {
            Err(TusError::Store { message }) => {
                ctx.fail(StatusCode::BAD_REQUEST, message);
                Ok(())
            }
            Err(TusError::NotFound { upload_id }) => {
                debug!(upload_id = %upload_id, "upload vanished during request");
                not_found(ctx);
                Ok(())
            }
            other => other,
        };

        if let Some(guard) = guard {
            if let Err(err) = guard.release().await {
                warn!(upload_id = %ctx.file_id(), error = %err, "failed to release upload lock");
            }
        }

        debug!(
            intent = %intent,
            upload_id = %ctx.file_id(),
            status = %ctx.response.status,
            "handled tus request"
        );
        result
    }

    async fn execute(&self, handler: IntentHandler, ctx: &mut RequestContext) -> TusResult<()> {
        if let Validation::Stop(rejection) = validate_all(handler.requirements(), ctx).await? {
            if rejection.status == StatusCode::NOT_FOUND {
                not_found(ctx);
            } else {
                ctx.fail(rejection.status, rejection.message);
            }
            return Ok(());
        }

        let before = handler.before_action(ctx, &self.events).await;
        if before.has_failed() {
            apply_failure(ctx, &before);
            return Ok(());
        }

        let outcome = handler.invoke(ctx).await?;

        let after = handler.after_action(ctx, &outcome, &self.events).await;
        if after.has_failed() {
            apply_failure(ctx, &after);
        }
        Ok(())
    }
}

/// 404 responses carry no body.
fn not_found(ctx: &mut RequestContext) {
    ctx.response.status = StatusCode::NOT_FOUND;
    ctx.response.message = None;
}

fn failure_response(outcome: &EventOutcome) -> TusResponse {
    TusResponse {
        status: outcome.status().unwrap_or(StatusCode::BAD_REQUEST),
        headers: http::HeaderMap::new(),
        message: Some(outcome.message()),
    }
}

fn apply_failure(ctx: &mut RequestContext, outcome: &EventOutcome) {
    ctx.fail(
        outcome.status().unwrap_or(StatusCode::BAD_REQUEST),
        outcome.message(),
    );
}
