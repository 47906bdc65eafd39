//! Lock service trait and error types

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;

/// Interval between acquisition attempts while another holder is live
pub const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors that can occur when interacting with a lock backend
#[derive(Debug, Error)]
pub enum LockError {
    /// The key is locked by another holder
    #[error("\"{key}\" is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Held {
        key: String,
        lock_id: String,
        who: String,
        operation: String,
    },

    /// The lock was not found (for release/force-unlock operations)
    #[error("Lock not found: {0}")]
    NotFound(String),

    /// Lock ID mismatch when trying to release
    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    /// Lock file is corrupted or invalid
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend storage or network error
    #[error("Lock backend error: {0}")]
    Backend(String),
}

impl LockError {
    /// Create a Held error from the live lock
    pub fn held(lock: &LockInfo) -> Self {
        Self::Held {
            key: lock.key.clone(),
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Trait for distributed lock backends
///
/// Locks are named: the key must be specific enough that unrelated resources
/// never serialize against each other, and general enough that every mutator
/// of the same resource uses the same key. Backends serialize holders of one
/// key but give no ordering guarantee and no reentrancy.
#[async_trait]
pub trait LockService: Send + Sync {
    /// One acquisition attempt
    ///
    /// Fails with `LockError::Held` if another holder's lock is live; an
    /// expired lock may be taken over.
    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo>;

    /// Release a previously acquired lock
    ///
    /// Verifies the held lock matches the provided lock info.
    async fn release(&self, lock: &LockInfo) -> LockResult<()>;

    /// Force release a lock by key and ID
    ///
    /// This is an administrative operation that should be used with caution.
    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()>;
}

/// Acquire the named lock, suspending until it becomes available
///
/// Polls `try_acquire` while another holder is live. No deadline of its own:
/// stale holders age out through lock expiry, and any caller-facing timeout
/// belongs to the caller.
pub async fn acquire_lock(
    service: &dyn LockService,
    key: &str,
    operation: &str,
) -> LockResult<LockInfo> {
    loop {
        match service.try_acquire(key, operation).await {
            Err(LockError::Held { .. }) => tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await,
            other => return other,
        }
    }
}
