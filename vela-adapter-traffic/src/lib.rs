//! Vela Traffic Adapter
//!
//! Translates platform lifecycle events for a DNS traffic-routing profile
//! into whole-document updates of the remote profile definition. The profile
//! is shared mutable state across concurrent lifecycle events, so every
//! mutation runs under the distributed lock named by the profile.

pub mod adapter;
pub mod config;
pub mod profile;
pub mod store;

// Re-export main types for convenience
pub use adapter::TrafficAdapter;
pub use config::{RoutingMethod, TrafficConfig};
pub use profile::{Endpoint, EndpointStatus, TrafficProfile};
pub use store::RestDocumentStore;
