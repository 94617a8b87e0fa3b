//! Lifecycle hooks.
//!
//! [`Events`] is a table of optional async callbacks the engine invokes at
//! fixed points of a request. Each callback receives an owned context and
//! returns an [`EventOutcome`]; a failed outcome stops the request with the
//! outcome's status and message.
//!
//! ```
//! use http::StatusCode;
//! use tuskit_core::events::{EventOutcome, Events};
//!
//! let events = Events::new().on_before_create(|ctx| async move {
//!     if ctx.metadata.contains_key("filename") {
//!         EventOutcome::proceed()
//!     } else {
//!         EventOutcome::proceed().fail_request_with_status(StatusCode::FORBIDDEN, "filename required")
//!     }
//! });
//! assert!(format!("{events:?}").contains("before_create: true"));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode};

use crate::cancellation::CancellationSignal;
use crate::error::TusResult;
use crate::intent::Intent;
use crate::parsers::{MetadataMap, UploadConcat};
use crate::store::{StoreAdapter, StoredFile};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Verdict of a hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    status: Option<StatusCode>,
    messages: Vec<String>,
}

impl EventOutcome {
    /// Let the request continue.
    #[must_use]
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Fail the request with 400, or keep an earlier status.
    #[must_use]
    pub fn fail_request(self, message: impl Into<String>) -> Self {
        let status = self.status.unwrap_or(StatusCode::BAD_REQUEST);
        self.fail_request_with_status(status, message)
    }

    /// Fail the request with `status`. Messages from repeated failures are
    /// joined by newlines and the last status wins.
    #[must_use]
    pub fn fail_request_with_status(mut self, status: StatusCode, message: impl Into<String>) -> Self {
        self.status = Some(status);
        self.messages.push(message.into());
        self
    }

    /// Whether the request should stop.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.status.is_some()
    }

    /// Failure status, if failed.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Failure messages joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.messages.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Passed to the authorize hook, once per intent.
#[derive(Debug, Clone)]
pub struct AuthorizeContext {
    /// Intent about to run.
    pub intent: Intent,
    /// Effective request method.
    pub method: Method,
    /// Addressed upload, `None` for base-path requests.
    pub upload_id: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Passed before an upload is created.
#[derive(Debug, Clone)]
pub struct BeforeCreateContext {
    /// Declared length, `None` when deferred or final.
    pub upload_length: Option<u64>,
    /// Whether the length is deferred.
    pub defer_length: bool,
    /// Decoded metadata.
    pub metadata: MetadataMap,
    /// Concatenation role of the new upload.
    pub upload_concat: UploadConcat,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Passed after an upload was created.
#[derive(Debug, Clone)]
pub struct CreateCompleteContext {
    /// Id of the new upload.
    pub upload_id: String,
    /// Declared length, if known.
    pub upload_length: Option<u64>,
    /// Decoded metadata.
    pub metadata: MetadataMap,
    /// Concatenation role of the new upload.
    pub upload_concat: UploadConcat,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Passed before data is appended.
#[derive(Debug, Clone)]
pub struct BeforeWriteContext {
    /// Upload being written.
    pub upload_id: String,
    /// Offset the client writes at.
    pub upload_offset: u64,
    /// Length set by this request for a deferred upload.
    pub upload_length: Option<u64>,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Passed before an upload is deleted.
#[derive(Debug, Clone)]
pub struct BeforeDeleteContext {
    /// Upload being deleted.
    pub upload_id: String,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Passed after an upload was deleted.
#[derive(Debug, Clone)]
pub struct DeleteCompleteContext {
    /// Deleted upload.
    pub upload_id: String,
}

/// Passed once an upload has received all of its bytes.
#[derive(Debug, Clone)]
pub struct FileCompleteContext {
    /// Completed upload.
    pub upload_id: String,
    /// Store the upload lives in.
    pub store: Arc<StoreAdapter>,
    /// Cancellation signal of the request that completed the upload.
    pub cancellation: CancellationSignal,
}

impl FileCompleteContext {
    /// Read the completed upload back, if the store is readable.
    pub async fn get_file(&self) -> TusResult<Option<StoredFile>> {
        self.store
            .readable()?
            .get_file(&self.upload_id, &self.cancellation)
            .await
    }
}

// ---------------------------------------------------------------------------
// Hook table
// ---------------------------------------------------------------------------

/// An async hook taking an owned context.
pub type EventHook<C> = Arc<dyn Fn(C) -> BoxFuture<'static, EventOutcome> + Send + Sync>;

fn hook<C, F, Fut>(f: F) -> EventHook<C>
where
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EventOutcome> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

async fn fire<C>(hook: Option<&EventHook<C>>, ctx: impl FnOnce() -> C) -> EventOutcome {
    match hook {
        Some(hook) => hook(ctx()).await,
        None => EventOutcome::proceed(),
    }
}

/// Callbacks invoked by the engine. All hooks are optional.
#[derive(Clone, Default)]
pub struct Events {
    authorize: Option<EventHook<AuthorizeContext>>,
    before_create: Option<EventHook<BeforeCreateContext>>,
    create_complete: Option<EventHook<CreateCompleteContext>>,
    before_write: Option<EventHook<BeforeWriteContext>>,
    before_delete: Option<EventHook<BeforeDeleteContext>>,
    delete_complete: Option<EventHook<DeleteCompleteContext>>,
    file_complete: Option<EventHook<FileCompleteContext>>,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("authorize", &self.authorize.is_some())
            .field("before_create", &self.before_create.is_some())
            .field("create_complete", &self.create_complete.is_some())
            .field("before_write", &self.before_write.is_some())
            .field("before_delete", &self.before_delete.is_some())
            .field("delete_complete", &self.delete_complete.is_some())
            .field("file_complete", &self.file_complete.is_some())
            .finish()
    }
}

macro_rules! hook_setter {
    ($(#[$doc:meta])* $setter:ident, $field:ident, $ctx:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $setter<F, Fut>(mut self, f: F) -> Self
        where
            F: Fn($ctx) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = EventOutcome> + Send + 'static,
        {
            self.$field = Some(hook(f));
            self
        }
    };
}

impl Events {
    /// An empty hook table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    hook_setter!(
        /// Runs first for every intent. A failure response carries no
        /// `Tus-Resumable` header.
        on_authorize, authorize, AuthorizeContext
    );
    hook_setter!(
        /// Runs after validation of a create or concatenate request.
        on_before_create, before_create, BeforeCreateContext
    );
    hook_setter!(
        /// Runs after an upload was created.
        on_create_complete, create_complete, CreateCompleteContext
    );
    hook_setter!(
        /// Runs after validation of a write request.
        on_before_write, before_write, BeforeWriteContext
    );
    hook_setter!(
        /// Runs after validation of a delete request.
        on_before_delete, before_delete, BeforeDeleteContext
    );
    hook_setter!(
        /// Runs after an upload was deleted.
        on_delete_complete, delete_complete, DeleteCompleteContext
    );
    hook_setter!(
        /// Runs once, when the last byte of an upload has been stored.
        on_file_complete, file_complete, FileCompleteContext
    );

    pub(crate) async fn authorize(&self, ctx: impl FnOnce() -> AuthorizeContext) -> EventOutcome {
        fire(self.authorize.as_ref(), ctx).await
    }

    pub(crate) async fn before_create(
        &self,
        ctx: impl FnOnce() -> BeforeCreateContext,
    ) -> EventOutcome {
        fire(self.before_create.as_ref(), ctx).await
    }

    pub(crate) async fn create_complete(
        &self,
        ctx: impl FnOnce() -> CreateCompleteContext,
    ) -> EventOutcome {
        fire(self.create_complete.as_ref(), ctx).await
    }

    pub(crate) async fn before_write(
        &self,
        ctx: impl FnOnce() -> BeforeWriteContext,
    ) -> EventOutcome {
        fire(self.before_write.as_ref(), ctx).await
    }

    pub(crate) async fn before_delete(
        &self,
        ctx: impl FnOnce() -> BeforeDeleteContext,
    ) -> EventOutcome {
        fire(self.before_delete.as_ref(), ctx).await
    }

    pub(crate) async fn delete_complete(
        &self,
        ctx: impl FnOnce() -> DeleteCompleteContext,
    ) -> EventOutcome {
        fire(self.delete_complete.as_ref(), ctx).await
    }

    pub(crate) async fn file_complete(
        &self,
        ctx: impl FnOnce() -> FileCompleteContext,
    ) -> EventOutcome {
        fire(self.file_complete.as_ref(), ctx).await
    }
}
