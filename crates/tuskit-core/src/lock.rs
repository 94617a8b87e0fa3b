//! Per-upload advisory locks.
//!
//! Write and delete handlers hold a lock on the upload id for the duration of
//! one handler invocation. Acquisition never waits: a second request for the
//! same id gets `None` immediately and is answered with 409.
//!
//! The runner holds each lock through a [`FileLockGuard`], so a request
//! future dropped mid-flight (client disconnect, host timeout) or a
//! panicking hook still frees the upload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::TusResult;

/// Proof of a held lock, returned to [`FileLockProvider::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLockToken {
    upload_id: String,
    lease: u64,
}

impl FileLockToken {
    /// Create a token. Providers choose the lease number.
    #[must_use]
    pub fn new(upload_id: impl Into<String>, lease: u64) -> Self {
        Self {
            upload_id: upload_id.into(),
            lease,
        }
    }

    /// The locked upload id.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Provider-specific lease number.
    #[must_use]
    pub fn lease(&self) -> u64 {
        self.lease
    }
}

/// Source of per-upload locks.
///
/// The default provider is process-local; hosts running several engine
/// instances against shared storage plug in a distributed one.
#[async_trait]
pub trait FileLockProvider: Send + Sync + fmt::Debug {
    /// Try to lock `upload_id`. Returns `None` if it is already locked.
    async fn acquire(&self, upload_id: &str) -> TusResult<Option<FileLockToken>>;

    /// Release a lock obtained from [`acquire`](Self::acquire). Releasing a
    /// token that no longer owns the lock is a no-op.
    async fn release(&self, token: FileLockToken) -> TusResult<()>;

    /// Release without waiting, for a guard dropped outside the normal path.
    /// Returns `false` when the provider cannot release synchronously; the
    /// guard then spawns [`release`](Self::release) on the current runtime.
    fn release_now(&self, _token: &FileLockToken) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// FileLockGuard
// ---------------------------------------------------------------------------

/// A held lock that is released when dropped.
///
/// Call [`release`](Self::release) on the normal path to observe release
/// errors; dropping the guard releases on a best-effort basis.
#[derive(Debug)]
pub struct FileLockGuard {
    provider: Arc<dyn FileLockProvider>,
    token: Option<FileLockToken>,
}

impl FileLockGuard {
    /// Take ownership of `token`, obtained from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn FileLockProvider>, token: FileLockToken) -> Self {
        Self {
            provider,
            token: Some(token),
        }
    }

    /// The locked upload id.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        self.token.as_ref().map_or("", FileLockToken::upload_id)
    }

    /// Release the lock and report the provider's result.
    pub async fn release(mut self) -> TusResult<()> {
        match self.token.take() {
            Some(token) => self.provider.release(token).await,
            None => Ok(()),
        }
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if self.provider.release_now(&token) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let provider = Arc::clone(&self.provider);
                handle.spawn(async move {
                    let upload_id = token.upload_id().to_owned();
                    if let Err(err) = provider.release(token).await {
                        warn!(
                            upload_id = %upload_id,
                            error = %err,
                            "failed to release dropped upload lock"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(upload_id = %token.upload_id(), "no runtime to release dropped upload lock");
            }
        }
    }
}

/// In-process lock provider: a set of held ids behind one mutex.
#[derive(Debug, Default)]
pub struct InMemoryFileLockProvider {
    held: Mutex<HashMap<String, u64>>,
    next_lease: AtomicU64,
}

impl InMemoryFileLockProvider {
    /// Create a provider with no locks held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `upload_id` is currently locked.
    #[must_use]
    pub fn is_locked(&self, upload_id: &str) -> bool {
        self.held.lock().contains_key(upload_id)
    }
}

#[async_trait]
impl FileLockProvider for InMemoryFileLockProvider {
    async fn acquire(&self, upload_id: &str) -> TusResult<Option<FileLockToken>> {
        let mut held = self.held.lock();
        if held.contains_key(upload_id) {
            trace!(upload_id = %upload_id, "lock already held");
            return Ok(None);
        }
        let lease = self.next_lease.fetch_add(1, Ordering::Relaxed);
        held.insert(upload_id.to_owned(), lease);
        trace!(upload_id = %upload_id, lease, "lock acquired");
        Ok(Some(FileLockToken::new(upload_id, lease)))
    }

    async fn release(&self, token: FileLockToken) -> TusResult<()> {
        self.release_now(&token);
        Ok(())
    }

    fn release_now(&self, token: &FileLockToken) -> bool {
        let mut held = self.held.lock();
        if held.get(token.upload_id()) == Some(&token.lease()) {
            held.remove(token.upload_id());
            trace!(upload_id = %token.upload_id(), lease = token.lease(), "lock released");
        }
        true
    }
}
