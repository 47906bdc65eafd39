//! Typed traffic-profile configuration

use vela_core::{AdapterError, AdapterResult, PropertyBag};

/// How traffic is routed across endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMethod {
    Performance,
    Failover,
    RoundRobin,
}

impl RoutingMethod {
    pub fn parse(value: &str) -> AdapterResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "performance" => Ok(Self::Performance),
            "failover" => Ok(Self::Failover),
            "roundrobin" | "round-robin" => Ok(Self::RoundRobin),
            other => Err(AdapterError::invalid_property(
                "routing-method",
                format!(
                    "\"{}\" is not one of performance, failover, roundrobin",
                    other
                ),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Failover => "failover",
            Self::RoundRobin => "roundrobin",
        }
    }
}

/// Validated profile configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficConfig {
    /// Profile name; also the distributed-lock key for every mutation
    pub profile_name: String,
    /// Public DNS name the profile answers for
    pub dns_name: String,
    pub ttl: u32,
    pub routing_method: RoutingMethod,
}

impl TrafficConfig {
    pub fn from_properties(bag: &PropertyBag) -> AdapterResult<Self> {
        let profile_name = bag.require_string("profile-name")?.to_string();
        let dns_name = bag.require_string("dns-name")?.to_string();

        let ttl = bag.get_int("ttl").unwrap_or(30);
        if ttl <= 0 || ttl > i64::from(u32::MAX) {
            return Err(AdapterError::invalid_property(
                "ttl",
                "must be a positive integer",
            ));
        }

        let routing_method = match bag.get_string("routing-method") {
            Some(value) => RoutingMethod::parse(value)?,
            None => RoutingMethod::RoundRobin,
        };

        Ok(Self {
            profile_name,
            dns_name,
            ttl: ttl as u32,
            routing_method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::PropertyValue;

    fn valid_bag() -> PropertyBag {
        PropertyBag::new()
            .with_string("profile-name", "profile-x")
            .with_string("dns-name", "app.example.com")
            .with("ttl", PropertyValue::Int(60))
            .with_string("routing-method", "failover")
    }

    #[test]
    fn valid_config() {
        let config = TrafficConfig::from_properties(&valid_bag()).unwrap();
        assert_eq!(config.profile_name, "profile-x");
        assert_eq!(config.dns_name, "app.example.com");
        assert_eq!(config.ttl, 60);
        assert_eq!(config.routing_method, RoutingMethod::Failover);
    }

    #[test]
    fn defaults_apply() {
        let bag = PropertyBag::new()
            .with_string("profile-name", "profile-x")
            .with_string("dns-name", "app.example.com");
        let config = TrafficConfig::from_properties(&bag).unwrap();
        assert_eq!(config.ttl, 30);
        assert_eq!(config.routing_method, RoutingMethod::RoundRobin);
    }

    #[test]
    fn invalid_ttl_fails() {
        let bag = PropertyBag::new()
            .with_string("profile-name", "profile-x")
            .with_string("dns-name", "app.example.com")
            .with("ttl", PropertyValue::Int(0));
        assert!(TrafficConfig::from_properties(&bag).is_err());
    }

    #[test]
    fn invalid_routing_method_fails() {
        let bag = PropertyBag::new()
            .with_string("profile-name", "profile-x")
            .with_string("dns-name", "app.example.com")
            .with_string("routing-method", "geographic");
        assert!(TrafficConfig::from_properties(&bag).is_err());
    }

    #[test]
    fn routing_method_parse() {
        assert_eq!(
            RoutingMethod::parse("Performance").unwrap(),
            RoutingMethod::Performance
        );
        assert_eq!(
            RoutingMethod::parse("round-robin").unwrap(),
            RoutingMethod::RoundRobin
        );
        assert!(RoutingMethod::parse("geo").is_err());
    }
}
