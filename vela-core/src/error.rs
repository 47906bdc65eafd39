//! Adapter error taxonomy

use thiserror::Error;

/// Errors raised inside an adapter before they are folded into an outcome
///
/// Configuration errors are produced eagerly, before any network call is
/// attempted, and are never retried. Provider and transport errors carry the
/// human-readable message the platform surfaces to the operator.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A required property is absent from the property bag
    #[error("Missing required property: {0}")]
    MissingProperty(String),

    /// A property is present but its value is unusable
    #[error("Invalid property \"{name}\": {reason}")]
    InvalidProperty { name: String, reason: String },

    /// An invalid combination of otherwise valid properties
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider answered with a non-success status
    #[error("Provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// The call never produced a provider response
    #[error("Transport error: {0}")]
    Transport(String),

    /// A distributed-lock or locked-update failure
    #[error("Lock error: {0}")]
    Lock(String),

    /// No ingress rule on any attached security group covers a requirement
    #[error("No ingress rule on instance \"{instance}\" covers {protocol} port {port}")]
    NoMatchingRule {
        instance: String,
        protocol: String,
        port: u16,
    },
}

impl AdapterError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid-property error
    pub fn invalid_property(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider-status error
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Whether this error means "the resource is not there", which several
    /// call sites treat as nothing-to-do rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider { status: 404, .. })
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
