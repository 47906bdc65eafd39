//! Platform domain objects handed to lifecycle hooks

use serde::{Deserialize, Serialize};

use crate::property::PropertyBag;

/// A managed service instance (one load balancer, one database, one profile)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub name: String,
    pub properties: PropertyBag,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }
}

/// A backend compute instance bound to a service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-side identifier (e.g., i-0abc123)
    pub id: String,
    pub name: String,
    pub properties: PropertyBag,
}

impl Instance {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }
}

/// Kind of platform object an outcome reports as modified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    ServiceInstance,
    Instance,
}

/// Identity of a platform object modified by an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
}

impl Entity {
    pub fn service_instance(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::ServiceInstance,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Instance,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;

    #[test]
    fn builders() {
        let service = ServiceInstance::new("lb-prod")
            .with_properties(PropertyBag::new().with("ttl", PropertyValue::Int(30)));
        assert_eq!(service.name, "lb-prod");
        assert_eq!(service.properties.get_int("ttl"), Some(30));

        let instance = Instance::new("i-0abc", "web-1");
        assert!(instance.properties.is_empty());
    }

    #[test]
    fn entity_constructors() {
        let e = Entity::service_instance("lb-prod");
        assert_eq!(e.kind, EntityKind::ServiceInstance);
        let e = Entity::instance("web-1");
        assert_eq!(e.kind, EntityKind::Instance);
    }
}
