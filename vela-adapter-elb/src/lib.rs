//! Vela ELB Adapter
//!
//! Translates platform lifecycle events for a classic load balancer into
//! provider calls, and reconciles backend security-group access so every
//! listener's instance port admits the load balancer's security groups.

pub mod adapter;
pub mod api;
pub mod config;
pub mod ec2;
pub mod rules;

// Re-export main types for convenience
pub use adapter::ElbAdapter;
pub use api::{Ec2Api, ElbApi, LoadBalancerDescription};
pub use config::{ElbConfig, ListenerConfig};
pub use ec2::AwsEc2Client;
pub use rules::{
    GrantOperation, IngressRule, PortProtocolRequirement, Protocol, SecurityGroup,
    find_matching_rule, plan_grants,
};
