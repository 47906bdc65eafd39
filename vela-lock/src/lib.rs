//! Vela Lock
//!
//! Named distributed locks and the locked read-modify-write update used to
//! mutate shared remote documents (e.g., a traffic-routing profile).
//!
//! # Overview
//!
//! - **LockInfo**: serialized lock metadata (holder, operation, expiry)
//! - **LockService**: a trait for lock backends (S3, in-memory)
//! - **LockedUpdater**: acquire the lock named by a document key, fetch the
//!   document, apply a caller-supplied mutation, write the whole document
//!   back, and release the lock on every exit path
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vela_lock::{DocUpdate, LockedUpdater, UpdateError};
//!
//! let updater = LockedUpdater::new(locks, store);
//!
//! let added = updater
//!     .with_lock("profile-x", "post-provision", |current| async move {
//!         let mut doc = current.ok_or_else(|| {
//!             UpdateError::Aborted("profile does not exist".to_string())
//!         })?;
//!         doc["endpoints"] = serde_json::json!(["web-1"]);
//!         Ok((DocUpdate::Replace(doc), true))
//!     })
//!     .await?;
//! ```

pub mod backends;
pub mod lock;
pub mod service;
pub mod updater;

// Re-export main types for convenience
pub use backends::{MemoryLockService, S3LockService};
pub use lock::LockInfo;
pub use service::{LockError, LockResult, LockService, acquire_lock};
pub use updater::{DocUpdate, DocumentStore, LockedUpdater, StoreError, UpdateError};
