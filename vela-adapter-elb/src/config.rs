//! Typed load-balancer configuration
//!
//! Built once from the service instance's property bag and validated eagerly;
//! nothing downstream touches the bag again.

use vela_core::{AdapterError, AdapterResult, Instance, PropertyBag};

use crate::rules::{PortProtocolRequirement, Protocol};

/// One listener: front-end port forwarded to an instance port
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerConfig {
    /// Listener protocol as declared (http, https, tcp, udp)
    pub protocol: String,
    pub load_balancer_port: u16,
    pub instance_port: u16,
}

impl ListenerConfig {
    /// Parse a listener declaration of the form "protocol:lb_port:instance_port"
    fn parse(value: &str) -> AdapterResult<Self> {
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != 3 {
            return Err(AdapterError::invalid_property(
                "listeners",
                format!(
                    "\"{}\" must be in the form protocol:lb_port:instance_port",
                    value
                ),
            ));
        }

        let parse_port = |part: &str| -> AdapterResult<u16> {
            let port: u16 = part.parse().map_err(|_| {
                AdapterError::invalid_property(
                    "listeners",
                    format!("\"{}\" is not a valid port number", part),
                )
            })?;
            if port == 0 {
                return Err(AdapterError::invalid_property(
                    "listeners",
                    "port 0 is not usable",
                ));
            }
            Ok(port)
        };

        Ok(Self {
            protocol: parts[0].to_string(),
            load_balancer_port: parse_port(parts[1])?,
            instance_port: parse_port(parts[2])?,
        })
    }
}

/// Validated load-balancer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ElbConfig {
    pub name: String,
    pub availability_zones: Vec<String>,
    pub listeners: Vec<ListenerConfig>,
    /// Security groups attached to the load balancer itself; these are the
    /// peers backend rules must admit
    pub front_end_security_groups: Vec<String>,
}

impl ElbConfig {
    /// Build and validate a config from a property bag
    pub fn from_properties(bag: &PropertyBag) -> AdapterResult<Self> {
        let name = bag.require_string("name")?.to_string();

        let availability_zones = bag.string_list("availability-zones")?;
        if availability_zones.is_empty() {
            return Err(AdapterError::invalid_property(
                "availability-zones",
                "at least one availability zone is required",
            ));
        }

        let listeners = bag
            .string_list("listeners")?
            .iter()
            .map(|entry| ListenerConfig::parse(entry))
            .collect::<AdapterResult<Vec<_>>>()?;
        if listeners.is_empty() {
            return Err(AdapterError::invalid_property(
                "listeners",
                "at least one listener is required",
            ));
        }

        let front_end_security_groups = bag.string_list("security-groups")?;
        if front_end_security_groups.is_empty() {
            return Err(AdapterError::invalid_property(
                "security-groups",
                "at least one security group is required",
            ));
        }

        Ok(Self {
            name,
            availability_zones,
            listeners,
            front_end_security_groups,
        })
    }

    /// What each backend instance must expose: one requirement per listener,
    /// on the listener's instance port
    pub fn requirements(&self) -> Vec<PortProtocolRequirement> {
        self.listeners
            .iter()
            .map(|listener| PortProtocolRequirement {
                protocol: Protocol::parse(Some(&listener.protocol)),
                port: listener.instance_port,
            })
            .collect()
    }
}

/// Security groups attached to a backend instance
pub fn instance_security_groups(instance: &Instance) -> AdapterResult<Vec<String>> {
    let groups = instance.properties.string_list("security-groups")?;
    if groups.is_empty() {
        return Err(AdapterError::invalid_property(
            "security-groups",
            format!("instance \"{}\" has no security groups", instance.name),
        ));
    }
    Ok(groups)
}
