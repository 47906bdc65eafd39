//! Vela SQL Database Adapter
//!
//! Lifecycle adapter for a managed SQL database. Configuration is validated
//! eagerly, before any provider call: a misconfigured request fails fast with
//! a message naming the property, and a rename attempt is rejected outright
//! because the provider cannot rename a database in place.

pub mod adapter;
pub mod config;

// Re-export main types for convenience
pub use adapter::SqlDbAdapter;
pub use config::{Edition, SqlDatabaseConfig};
