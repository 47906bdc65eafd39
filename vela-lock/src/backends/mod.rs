//! Lock backend implementations

mod memory;
mod s3;

pub use memory::MemoryLockService;
pub use s3::S3LockService;
