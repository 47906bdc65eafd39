//! Vela Core
//!
//! Core library for Vela, a set of managed-service adapters that translate
//! orchestration-platform lifecycle events into provider API calls.
//!
//! This crate carries the pieces shared by every adapter:
//!
//! - **Domain objects**: `ServiceInstance`, `Instance`, and the property bags
//!   the platform attaches to them
//! - **Lifecycle surface**: the `ServiceAdapter` trait each adapter implements,
//!   with default no-op hooks
//! - **Outcomes**: `OperationOutcome` and the aggregation of sub-operation
//!   results into one composite response
//! - **Transport**: the `RestTransport` abstraction adapters drive provider
//!   APIs through

pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod outcome;
pub mod property;
pub mod transport;

// Re-export main types for convenience
pub use domain::{Entity, EntityKind, Instance, ServiceInstance};
pub use error::{AdapterError, AdapterResult};
pub use lifecycle::{LifecycleRequest, ServiceAdapter};
pub use outcome::{OperationOutcome, OperationStatus, aggregate};
pub use property::{AssetProperty, PropertyBag, PropertyValue};
pub use transport::{RestResponse, RestTransport};
