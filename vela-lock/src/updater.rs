//! Locked document updates
//!
//! A remote document (e.g., a traffic-routing profile) is shared between
//! concurrent lifecycle operations. Every mutation goes through
//! `LockedUpdater::with_lock`: acquire the lock named by the document key,
//! fetch the document fresh, apply the caller's mutation in memory, write the
//! whole document back, release the lock. The lock is released exactly once
//! whether the body returns, fails, or the enclosing task is cancelled.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::service::{LockError, LockService, acquire_lock};

/// Errors that can occur when interacting with a document store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store or network error
    #[error("Document store error: {0}")]
    Backend(String),

    /// Document is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for remote document storage
///
/// Documents are read whole and replaced whole; there is no partial patch.
/// `fetch` distinguishes "the resource does not exist" (`None`) from a hard
/// failure, so callers can decide whether a missing document is benign.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn store(&self, key: &str, document: &Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// What to do with the document after the mutation body runs
#[derive(Debug, Clone, PartialEq)]
pub enum DocUpdate {
    /// Replace the remote document with this one
    Replace(Value),
    /// Delete the remote document
    Remove,
    /// Leave the remote document as it is
    Keep,
}

/// Errors from a locked update
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The mutation body declined to proceed
    #[error("Update aborted: {0}")]
    Aborted(String),
}

/// Locked read-modify-write of remote documents
pub struct LockedUpdater {
    locks: Arc<dyn LockService>,
    store: Arc<dyn DocumentStore>,
}

impl LockedUpdater {
    pub fn new(locks: Arc<dyn LockService>, store: Arc<dyn DocumentStore>) -> Self {
        Self { locks, store }
    }

    /// Run `body` with the lock named `key` held
    ///
    /// Acquisition suspends until the lock is free. The body receives the
    /// current document (`None` if the store reports not-found) and returns
    /// what to do with it plus a value passed through to the caller. A failed
    /// write-back discards the in-memory mutation. The lock is released
    /// exactly once on every exit path; cancellation of the enclosing task
    /// schedules the release on the runtime.
    pub async fn with_lock<T, F, Fut>(
        &self,
        key: &str,
        operation: &str,
        body: F,
    ) -> Result<T, UpdateError>
    where
        F: FnOnce(Option<Value>) -> Fut,
        Fut: Future<Output = Result<(DocUpdate, T), UpdateError>> + Send,
    {
        let lock = acquire_lock(self.locks.as_ref(), key, operation).await?;
        let guard = ReleaseGuard::new(Arc::clone(&self.locks), lock);

        let result = self.run_body(key, body).await;

        guard.release().await;
        result
    }

    async fn run_body<T, F, Fut>(&self, key: &str, body: F) -> Result<T, UpdateError>
    where
        F: FnOnce(Option<Value>) -> Fut,
        Fut: Future<Output = Result<(DocUpdate, T), UpdateError>> + Send,
    {
        let current = self.store.fetch(key).await?;
        let (update, value) = body(current).await?;

        match update {
            DocUpdate::Replace(document) => self.store.store(key, &document).await?,
            DocUpdate::Remove => self.store.remove(key).await?,
            DocUpdate::Keep => {}
        }

        Ok(value)
    }
}

/// Releases the held lock at most once
///
/// The explicit `release` path consumes the guard; if the guard is dropped
/// instead (the enclosing future was cancelled), the release is spawned onto
/// the runtime so it still runs.
struct ReleaseGuard {
    service: Arc<dyn LockService>,
    lock: Option<LockInfo>,
}

impl ReleaseGuard {
    fn new(service: Arc<dyn LockService>, lock: LockInfo) -> Self {
        Self {
            service,
            lock: Some(lock),
        }
    }

    async fn release(mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(e) = self.service.release(&lock).await {
                log::warn!("failed to release lock \"{}\": {}", lock.key, e);
            }
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let service = Arc::clone(&self.service);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = service.release(&lock).await {
                            log::warn!("failed to release lock \"{}\": {}", lock.key, e);
                        }
                    });
                }
                Err(_) => {
                    log::warn!(
                        "lock \"{}\" dropped outside a runtime; it will expire on its own",
                        lock.key
                    );
                }
            }
        }
    }
}
