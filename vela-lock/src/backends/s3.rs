//! S3 lock backend
//!
//! Each key maps to one lock object. Acquisition writes the lock file and
//! reads it back to detect a racing writer; an expired lock file may be
//! deleted and taken over.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;

use crate::lock::LockInfo;
use crate::service::{LockError, LockResult, LockService};

/// S3-based lock service
pub struct S3LockService {
    /// S3 client
    client: Client,
    /// Bucket name
    bucket: String,
    /// Key prefix under which lock objects live
    prefix: String,
    /// Whether to encrypt lock objects (default: true)
    encrypt: bool,
}

impl S3LockService {
    /// Create a new S3LockService, loading AWS config for the given region
    pub async fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.into()))
            .load()
            .await;

        Self::with_client(Client::new(&aws_config), bucket, prefix)
    }

    /// Create a new S3LockService with an existing client
    pub fn with_client(
        client: Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            encrypt: true,
        }
    }

    /// Disable server-side encryption of lock objects
    pub fn without_encryption(mut self) -> Self {
        self.encrypt = false;
        self
    }

    /// Get the object key for a lock key
    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}.lock", key)
        } else {
            format!("{}/{}.lock", self.prefix.trim_end_matches('/'), key)
        }
    }

    /// Read the lock object for a key
    async fn read_lock(&self, key: &str) -> LockResult<Option<LockInfo>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await;

        match result {
            Ok(output) => {
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| LockError::Backend(e.to_string()))?;
                let bytes = body.into_bytes();
                let lock: LockInfo = serde_json::from_slice(&bytes)
                    .map_err(|e| LockError::Serialization(e.to_string()))?;
                Ok(Some(lock))
            }
            Err(err) => {
                if is_not_found_error(&err) {
                    Ok(None)
                } else {
                    Err(LockError::Backend(err.to_string()))
                }
            }
        }
    }

    /// Write a lock object
    async fn write_lock(&self, lock: &LockInfo) -> LockResult<()> {
        let body = serde_json::to_vec_pretty(lock)
            .map_err(|e| LockError::Serialization(e.to_string()))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(&lock.key))
            .body(ByteStream::from(body))
            .content_type("application/json");

        if self.encrypt {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Delete the lock object for a key
    async fn delete_lock(&self, key: &str) -> LockResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl LockService for S3LockService {
    async fn try_acquire(&self, key: &str, operation: &str) -> LockResult<LockInfo> {
        // Check for existing lock
        if let Some(existing_lock) = self.read_lock(key).await? {
            if existing_lock.is_expired() {
                // Expired lock - delete it and proceed
                log::warn!(
                    "taking over expired lock on \"{}\" held by {}",
                    key,
                    existing_lock.who
                );
                self.delete_lock(key).await?;
            } else {
                return Err(LockError::held(&existing_lock));
            }
        }

        // Create and write new lock
        let lock = LockInfo::new(key, operation);
        self.write_lock(&lock).await?;

        // Verify we got the lock (in case of race condition)
        // Read it back and check it's ours
        if let Some(written_lock) = self.read_lock(key).await? {
            if written_lock.id == lock.id {
                return Ok(lock);
            } else {
                // Someone else got the lock
                return Err(LockError::held(&written_lock));
            }
        }

        // This shouldn't happen, but just in case
        Ok(lock)
    }

    async fn release(&self, lock: &LockInfo) -> LockResult<()> {
        // Verify the lock exists and matches
        if let Some(existing_lock) = self.read_lock(&lock.key).await? {
            if existing_lock.id != lock.id {
                return Err(LockError::Mismatch {
                    expected: lock.id.clone(),
                    actual: existing_lock.id,
                });
            }
        } else {
            return Err(LockError::NotFound(lock.id.clone()));
        }

        self.delete_lock(&lock.key).await
    }

    async fn force_unlock(&self, key: &str, lock_id: &str) -> LockResult<()> {
        // Verify a lock exists
        if let Some(existing_lock) = self.read_lock(key).await? {
            if existing_lock.id != lock_id {
                return Err(LockError::Mismatch {
                    expected: lock_id.to_string(),
                    actual: existing_lock.id,
                });
            }
        } else {
            return Err(LockError::NotFound(lock_id.to_string()));
        }

        self.delete_lock(key).await
    }
}

/// Check if an S3 error is a "not found" error
fn is_not_found_error<E: std::fmt::Debug>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
    // Check the raw HTTP response status
    if let Some(raw) = err.raw_response() {
        return raw.status().as_u16() == 404;
    }
    false
}
