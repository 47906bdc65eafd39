//! REST transport abstraction
//!
//! Adapters drive provider APIs through this trait instead of holding an HTTP
//! client. The provider's exact request/response schemas are vendor-defined;
//! the adapters only need the status code and the decoded body.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AdapterResult;

/// A decoded provider response
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub body: Value,
}

impl RestResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Success response with an empty body
    pub fn ok() -> Self {
        Self::new(200, Value::Null)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Provider REST surface
///
/// An `Err` means the call never produced a provider response; a non-2xx
/// status arrives as an `Ok` response so call sites can decide whether it is
/// benign (e.g., 404 during release) or a failure.
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn get(&self, uri: &str) -> AdapterResult<RestResponse>;

    async fn post(&self, uri: &str, body: Value) -> AdapterResult<RestResponse>;
}
