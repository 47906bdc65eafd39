//! In-process lock backend
//!
//! Serializes holders within one process. Used by tests and by single-node
//! deployments where no other writer can exist.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::lock::LockInfo;
use crate::service::{LockError, LockResult, LockService};

/// In-memory lock service
#[derive(Default)]
pub struct MemoryLockService {
    locks: Mutex<HashMap<String, LockInfo>>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, lock: LockInfo) {
        self.locks.lock().unwrap().insert(lock.key.clone(), lock);
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        let mut locks = self.locks.lock().unwrap();

        if let Some(existing_lock) = locks.get(key) {
            if !existing_lock.is_expired() {
                return Err(LockError::held(existing_lock));
            }
            // Expired lock - take it over
        }

        let lock = LockInfo::new(key, operation);
        locks.insert(key.to_string(), lock.clone());
        Ok(lock)
    }

    async fn release(&self, lock: &LockInfo) -> LockResult<()> {
        let mut locks = self.locks.lock().unwrap();

        match locks.get(&lock.key) {
            Some(existing_lock) if existing_lock.id == lock.id => {
                locks.remove(&lock.key);
                Ok(())
            }
            Some(existing_lock) => Err(LockError::Mismatch {
                expected: lock.id.clone(),
                actual: existing_lock.id.clone(),
            }),
            None => Err(LockError::NotFound(lock.id.clone())),
        }
    }

    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()> {
        let mut locks = self.locks.lock().unwrap();

        match locks.get(key) {
            Some(existing_lock) if existing_lock.id == lock_id => {
                locks.remove(key);
                Ok(())
            }
            Some(existing_lock) => Err(LockError::Mismatch {
                expected: lock_id.to_string(),
                actual: existing_lock.id.clone(),
            }),
            None => Err(LockError::NotFound(lock_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::acquire_lock;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let service = MemoryLockService::new();

        let lock = service.try_acquire("profile-x", "provision").await.unwrap();
        assert_eq!(lock.key, "profile-x");
        assert_eq!(lock.operation, "provision");

        // Second attempt on the same key fails
        let result = service.try_acquire("profile-x", "release").await;
        assert!(matches!(result, Err(LockError::Held { .. })));

        // Unrelated keys are not serialized against each other
        let other = service.try_acquire("profile-y", "provision").await.unwrap();
        service.release(&other).await.unwrap();

        service.release(&lock).await.unwrap();

        // Now can acquire again
        let lock2 = service.try_acquire("profile-x", "release").await.unwrap();
        service.release(&lock2).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_lock_takeover() {
        let service = MemoryLockService::new();
        service.seed(LockInfo::with_timeout("profile-x", "provision", -1));

        let lock = service.try_acquire("profile-x", "release").await.unwrap();
        assert_eq!(lock.operation, "release");
        service.release(&lock).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_requires_matching_id() {
        let service = MemoryLockService::new();
        let lock = service.try_acquire("profile-x", "provision").await.unwrap();

        let stranger = LockInfo::new("profile-x", "release");
        let result = service.release(&stranger).await;
        assert!(matches!(result, Err(LockError::Mismatch { .. })));

        service.release(&lock).await.unwrap();

        let result = service.release(&lock).await;
        assert!(matches!(result, Err(LockError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_force_unlock() {
        let service = MemoryLockService::new();
        let lock = service.try_acquire("profile-x", "provision").await.unwrap();

        let result = service.force_unlock("profile-x", "wrong-id").await;
        assert!(matches!(result, Err(LockError::Mismatch { .. })));

        service.force_unlock("profile-x", &lock.id).await.unwrap();
        assert!(service.try_acquire("profile-x", "release").await.is_ok());
    }

    #[tokio::test]
    async fn test_blocking_acquire_waits_for_release() {
        use std::sync::Arc;

        let service = Arc::new(MemoryLockService::new());
        let lock = service.try_acquire("profile-x", "provision").await.unwrap();

        let contender = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                acquire_lock(service.as_ref(), "profile-x", "release").await
            })
        };

        // Give the contender time to start polling, then release
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        service.release(&lock).await.unwrap();

        let acquired = contender.await.unwrap().unwrap();
        assert_eq!(acquired.operation, "release");
        service.release(&acquired).await.unwrap();
    }
}
