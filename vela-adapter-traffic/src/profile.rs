//! Traffic-profile document model
//!
//! The remote profile definition, as one whole JSON document. Mutations
//! happen on this in-memory form and the full document is posted back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vela_lock::{StoreError, UpdateError};

use crate::config::TrafficConfig;

/// Whether an endpoint receives traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Enabled,
    Disabled,
}

/// One routing target in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// Address traffic is routed to
    pub target: String,
    pub status: EndpointStatus,
}

/// The whole profile definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    pub name: String,
    pub dns_name: String,
    pub ttl: u32,
    pub routing_method: String,
    pub endpoints: Vec<Endpoint>,
}

impl TrafficProfile {
    /// A fresh profile with no endpoints
    pub fn from_config(config: &TrafficConfig) -> Self {
        Self {
            name: config.profile_name.clone(),
            dns_name: config.dns_name.clone(),
            ttl: config.ttl,
            routing_method: config.routing_method.as_str().to_string(),
            endpoints: Vec::new(),
        }
    }

    /// Add or replace the endpoint with this name
    pub fn upsert_endpoint(&mut self, endpoint: Endpoint) {
        match self.endpoints.iter_mut().find(|e| e.name == endpoint.name) {
            Some(existing) => *existing = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }

    /// Remove the endpoint with this name; false if it was not present
    pub fn remove_endpoint(&mut self, name: &str) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| e.name != name);
        self.endpoints.len() != before
    }

    /// Set an endpoint's status; false if it was not present
    pub fn set_endpoint_status(&mut self, name: &str, status: EndpointStatus) -> bool {
        match self.endpoints.iter_mut().find(|e| e.name == name) {
            Some(endpoint) => {
                endpoint.status = status;
                true
            }
            None => false,
        }
    }

    /// Decode a profile from the stored document
    pub fn from_value(value: Value) -> Result<Self, UpdateError> {
        serde_json::from_value(value)
            .map_err(|e| UpdateError::Store(StoreError::Serialization(e.to_string())))
    }

    /// Encode the profile for whole-document replace
    pub fn to_value(&self) -> Result<Value, UpdateError> {
        serde_json::to_value(self)
            .map_err(|e| UpdateError::Store(StoreError::Serialization(e.to_string())))
    }
}
