//! Provider collaborator traits for the load-balancer adapter

use async_trait::async_trait;

use vela_core::AdapterResult;

use crate::config::{ElbConfig, ListenerConfig};
use crate::rules::{GrantOperation, SecurityGroup};

/// Security-group query and grant surface
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Describe security groups by ID
    async fn describe_security_groups(&self, ids: &[String])
    -> AdapterResult<Vec<SecurityGroup>>;

    /// Widen one ingress rule with one peer group
    async fn authorize_ingress(&self, grant: &GrantOperation) -> AdapterResult<()>;
}

/// Current provider-side view of a load balancer
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerDescription {
    pub name: String,
    pub dns_name: String,
    /// IDs of instances currently registered
    pub instances: Vec<String>,
}

/// Load-balancer control plane
///
/// The concrete SDK binding is supplied by the embedder; the adapter only
/// needs these operations.
#[async_trait]
pub trait ElbApi: Send + Sync {
    /// Create the load balancer; returns its DNS name
    async fn create_load_balancer(&self, config: &ElbConfig) -> AdapterResult<String>;

    async fn delete_load_balancer(&self, name: &str) -> AdapterResult<()>;

    /// Describe one load balancer; `None` if it does not exist
    async fn describe_load_balancer(
        &self,
        name: &str,
    ) -> AdapterResult<Option<LoadBalancerDescription>>;

    async fn register_instances(&self, name: &str, instance_ids: &[String])
    -> AdapterResult<()>;

    async fn deregister_instances(
        &self,
        name: &str,
        instance_ids: &[String],
    ) -> AdapterResult<()>;

    /// Replace the listener set
    async fn apply_listeners(
        &self,
        name: &str,
        listeners: &[ListenerConfig],
    ) -> AdapterResult<()>;
}
