//! Load-balancer lifecycle implementation

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use vela_core::{
    AdapterResult, Entity, LifecycleRequest, OperationOutcome, ServiceAdapter, aggregate,
};

use crate::api::{Ec2Api, ElbApi};
use crate::config::{ElbConfig, instance_security_groups};
use crate::rules::{GrantOperation, PortProtocolRequirement, plan_grants};

/// Adapter for a classic load balancer
pub struct ElbAdapter {
    elb: Arc<dyn ElbApi>,
    ec2: Arc<dyn Ec2Api>,
}

impl ElbAdapter {
    pub fn new(elb: Arc<dyn ElbApi>, ec2: Arc<dyn Ec2Api>) -> Self {
        Self { elb, ec2 }
    }

    /// Resolve an instance's groups and compute its missing grants
    async fn plan_for_instance(
        &self,
        instance: &vela_core::Instance,
        requirements: &[PortProtocolRequirement],
        front_end_peers: &[String],
    ) -> AdapterResult<Vec<GrantOperation>> {
        let group_ids = instance_security_groups(instance)?;
        let groups = self.ec2.describe_security_groups(&group_ids).await?;
        plan_grants(&instance.name, &groups, requirements, front_end_peers)
    }

    async fn issue_grant(&self, grant: &GrantOperation) -> OperationOutcome {
        match self.ec2.authorize_ingress(grant).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Granted {} {}-{} on {} to {}",
                grant.protocol.as_str(),
                grant.from_port,
                grant.to_port,
                grant.group_id,
                grant.peer
            )),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to grant {} {}-{} on {}: {}",
                grant.protocol.as_str(),
                grant.from_port,
                grant.to_port,
                grant.group_id,
                e
            )),
        }
    }

    /// Deregister instances without letting provider errors escape
    ///
    /// Release and stop transitions must not be blocked by a balancer that is
    /// already gone or unreachable.
    async fn deregister_best_effort(
        &self,
        name: &str,
        request: &LifecycleRequest,
    ) -> OperationOutcome {
        let ids: Vec<String> = request.instances.iter().map(|i| i.id.clone()).collect();
        if ids.is_empty() {
            return OperationOutcome::noop();
        }

        match self.elb.deregister_instances(name, &ids).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Deregistered {} instance(s) from {}",
                ids.len(),
                name
            ))
            .with_modified(
                request
                    .instances
                    .iter()
                    .map(|i| Entity::instance(&i.name))
                    .collect(),
            ),
            Err(e) => {
                log::warn!("deregister from {} failed, continuing: {}", name, e);
                OperationOutcome::complete(format!(
                    "Deregister from {} failed and was skipped: {}",
                    name, e
                ))
            }
        }
    }
}

#[async_trait]
impl ServiceAdapter for ElbAdapter {
    fn name(&self) -> &'static str {
        "elb"
    }

    async fn provision(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match ElbConfig::from_properties(&request.service_instance.properties) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.elb.create_load_balancer(&config).await {
            Ok(dns_name) => OperationOutcome::complete(format!(
                "Created load balancer {} at {}",
                config.name, dns_name
            ))
            .with_modified(vec![Entity::service_instance(&request.service_instance.name)]),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to create load balancer {}: {}",
                config.name, e
            )),
        }
    }

    /// Register the backend instances and reconcile security-group access
    ///
    /// Grants for independent rules are issued concurrently and are
    /// fate-independent; sub-outcomes aggregate with the all-failed-is-fatal
    /// policy, so one failed grant degrades the message while the others
    /// still land.
    async fn post_provision(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match ElbConfig::from_properties(&request.service_instance.properties) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let mut outcomes = Vec::new();

        let ids: Vec<String> = request.instances.iter().map(|i| i.id.clone()).collect();
        if !ids.is_empty() {
            match self.elb.register_instances(&config.name, &ids).await {
                Ok(()) => outcomes.push(
                    OperationOutcome::complete(format!(
                        "Registered {} instance(s) with {}",
                        ids.len(),
                        config.name
                    ))
                    .with_modified(
                        request
                            .instances
                            .iter()
                            .map(|i| Entity::instance(&i.name))
                            .collect(),
                    ),
                ),
                Err(e) => outcomes.push(OperationOutcome::failure(format!(
                    "Failed to register instances with {}: {}",
                    config.name, e
                ))),
            }
        }

        let requirements = config.requirements();
        let mut grants = Vec::new();
        for instance in &request.instances {
            match self
                .plan_for_instance(instance, &requirements, &config.front_end_security_groups)
                .await
            {
                Ok(planned) => grants.extend(planned),
                Err(e) => outcomes.push(OperationOutcome::failure(e.to_string())),
            }
        }

        let grant_outcomes = join_all(grants.iter().map(|g| self.issue_grant(g))).await;
        outcomes.extend(grant_outcomes);

        aggregate(outcomes, true)
    }

    async fn reconfigure(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match ElbConfig::from_properties(&request.service_instance.properties) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.elb.apply_listeners(&config.name, &config.listeners).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Applied {} listener(s) to {}",
                config.listeners.len(),
                config.name
            ))
            .with_modified(vec![Entity::service_instance(&request.service_instance.name)]),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to apply listeners to {}: {}",
                config.name, e
            )),
        }
    }

    async fn pre_release(&self, request: &LifecycleRequest) -> OperationOutcome {
        let Ok(name) = request.service_instance.properties.require_string("name") else {
            return OperationOutcome::noop();
        };
        self.deregister_best_effort(name, request).await
    }

    async fn release(&self, request: &LifecycleRequest) -> OperationOutcome {
        let name = match request.service_instance.properties.require_string("name") {
            Ok(name) => name,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.elb.describe_load_balancer(name).await {
            Ok(None) => {
                OperationOutcome::complete(format!("Load balancer {} is already absent", name))
            }
            Ok(Some(_)) => match self.elb.delete_load_balancer(name).await {
                Ok(()) => OperationOutcome::complete(format!("Deleted load balancer {}", name))
                    .with_modified(vec![Entity::service_instance(
                        &request.service_instance.name,
                    )]),
                Err(e) => OperationOutcome::failure(format!(
                    "Failed to delete load balancer {}: {}",
                    name, e
                )),
            },
            Err(e) => {
                // A balancer we cannot see must not block the release
                log::warn!("describe {} failed during release, continuing: {}", name, e);
                OperationOutcome::complete(format!(
                    "Could not confirm load balancer {}: {}",
                    name, e
                ))
            }
        }
    }

    async fn start(&self, request: &LifecycleRequest) -> OperationOutcome {
        let name = match request.service_instance.properties.require_string("name") {
            Ok(name) => name,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let ids: Vec<String> = request.instances.iter().map(|i| i.id.clone()).collect();
        if ids.is_empty() {
            return OperationOutcome::noop();
        }

        match self.elb.register_instances(name, &ids).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Registered {} instance(s) with {}",
                ids.len(),
                name
            ))
            .with_modified(
                request
                    .instances
                    .iter()
                    .map(|i| Entity::instance(&i.name))
                    .collect(),
            ),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to register instances with {}: {}",
                name, e
            )),
        }
    }

    async fn stop(&self, request: &LifecycleRequest) -> OperationOutcome {
        let Ok(name) = request.service_instance.properties.require_string("name") else {
            return OperationOutcome::noop();
        };
        self.deregister_best_effort(name, request).await
    }

    async fn ping(&self, request: &LifecycleRequest) -> OperationOutcome {
        let name = match request.service_instance.properties.require_string("name") {
            Ok(name) => name,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.elb.describe_load_balancer(name).await {
            Ok(Some(description)) => OperationOutcome::complete(format!(
                "Load balancer {} is reachable at {} with {} registered instance(s)",
                name,
                description.dns_name,
                description.instances.len()
            )),
            Ok(None) => {
                OperationOutcome::failure(format!("Load balancer {} does not exist", name))
            }
            Err(e) => OperationOutcome::failure(format!(
                "Failed to describe load balancer {}: {}",
                name, e
            )),
        }
    }

    /// Compare the platform's instance set against what is registered
    async fn sync(&self, request: &LifecycleRequest) -> OperationOutcome {
        let name = match request.service_instance.properties.require_string("name") {
            Ok(name) => name,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let description = match self.elb.describe_load_balancer(name).await {
            Ok(Some(description)) => description,
            Ok(None) => {
                return OperationOutcome::failure(format!(
                    "Load balancer {} does not exist",
                    name
                ));
            }
            Err(e) => {
                return OperationOutcome::failure(format!(
                    "Failed to describe load balancer {}: {}",
                    name, e
                ));
            }
        };

        let missing: Vec<&str> = request
            .instances
            .iter()
            .filter(|i| !description.instances.contains(&i.id))
            .map(|i| i.name.as_str())
            .collect();

        if missing.is_empty() {
            OperationOutcome::complete(format!(
                "Load balancer {} is in sync ({} instance(s))",
                name,
                description.instances.len()
            ))
        } else {
            OperationOutcome::complete(format!(
                "Load balancer {} is missing registration(s) for: {}",
                name,
                missing.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use vela_core::{
        AdapterError, Instance, OperationStatus, PropertyBag, PropertyValue, ServiceInstance,
    };

    use crate::api::LoadBalancerDescription;
    use crate::config::ListenerConfig;
    use crate::rules::{IngressRule, Protocol, SecurityGroup};

    fn string_list(values: &[&str]) -> PropertyValue {
        PropertyValue::List(
            values
                .iter()
                .map(|v| PropertyValue::String(v.to_string()))
                .collect(),
        )
    }

    fn request_with_instance() -> LifecycleRequest {
        let service = ServiceInstance::new("lb-svc").with_properties(
            PropertyBag::new()
                .with_string("name", "front-lb")
                .with("availability-zones", string_list(&["us-east-1a"]))
                .with("listeners", string_list(&["https:443:443"]))
                .with("security-groups", string_list(&["sg-lb1"])),
        );
        let instance = Instance::new("i-1", "web-1").with_properties(
            PropertyBag::new().with("security-groups", string_list(&["sg-web"])),
        );
        LifecycleRequest::new(service).with_instances(vec![instance])
    }

    /// EC2 double whose group state reflects issued grants
    struct FakeEc2 {
        groups: Mutex<Vec<SecurityGroup>>,
        grants: Mutex<Vec<GrantOperation>>,
        fail_grants: bool,
    }

    impl FakeEc2 {
        fn with_groups(groups: Vec<SecurityGroup>) -> Self {
            Self {
                groups: Mutex::new(groups),
                grants: Mutex::new(Vec::new()),
                fail_grants: false,
            }
        }

        fn grant_count(&self) -> usize {
            self.grants.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Ec2Api for FakeEc2 {
        async fn describe_security_groups(
            &self,
            ids: &[String],
        ) -> AdapterResult<Vec<SecurityGroup>> {
            let groups = self.groups.lock().unwrap();
            Ok(groups
                .iter()
                .filter(|g| ids.contains(&g.id))
                .cloned()
                .collect())
        }

        async fn authorize_ingress(&self, grant: &GrantOperation) -> AdapterResult<()> {
            if self.fail_grants {
                return Err(AdapterError::provider(500, "authorize refused"));
            }
            self.grants.lock().unwrap().push(grant.clone());

            // Reflect the grant in the group model, as the provider would
            let mut groups = self.groups.lock().unwrap();
            let group = groups.iter_mut().find(|g| g.id == grant.group_id).unwrap();
            let rule = group
                .rules
                .iter_mut()
                .find(|r| r.covers(grant.protocol, grant.from_port))
                .unwrap();
            rule.peers.push(grant.peer.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeElb {
        registered: Mutex<Vec<String>>,
        deregister_fails: bool,
        exists: bool,
    }

    #[async_trait]
    impl ElbApi for FakeElb {
        async fn create_load_balancer(&self, config: &ElbConfig) -> AdapterResult<String> {
            Ok(format!("{}.elb.example.com", config.name))
        }

        async fn delete_load_balancer(&self, _name: &str) -> AdapterResult<()> {
            Ok(())
        }

        async fn describe_load_balancer(
            &self,
            name: &str,
        ) -> AdapterResult<Option<LoadBalancerDescription>> {
            if self.exists {
                Ok(Some(LoadBalancerDescription {
                    name: name.to_string(),
                    dns_name: format!("{}.elb.example.com", name),
                    instances: self.registered.lock().unwrap().clone(),
                }))
            } else {
                Ok(None)
            }
        }

        async fn register_instances(
            &self,
            _name: &str,
            instance_ids: &[String],
        ) -> AdapterResult<()> {
            self.registered
                .lock()
                .unwrap()
                .extend(instance_ids.iter().cloned());
            Ok(())
        }

        async fn deregister_instances(
            &self,
            _name: &str,
            instance_ids: &[String],
        ) -> AdapterResult<()> {
            if self.deregister_fails {
                return Err(AdapterError::provider(500, "deregister refused"));
            }
            self.registered
                .lock()
                .unwrap()
                .retain(|id| !instance_ids.contains(id));
            Ok(())
        }

        async fn apply_listeners(
            &self,
            _name: &str,
            _listeners: &[ListenerConfig],
        ) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn web_group(peers: &[&str]) -> SecurityGroup {
        SecurityGroup {
            id: "sg-web".to_string(),
            rules: vec![IngressRule {
                protocol: Protocol::Tcp,
                from_port: 443,
                to_port: 443,
                peers: peers.iter().map(|s| s.to_string()).collect(),
            }],
        }
    }

    #[tokio::test]
    async fn post_provision_registers_and_grants() {
        let ec2 = Arc::new(FakeEc2::with_groups(vec![web_group(&[])]));
        let elb = Arc::new(FakeElb::default());
        let adapter = ElbAdapter::new(elb.clone(), ec2.clone());

        let outcome = adapter.post_provision(&request_with_instance()).await;

        assert_eq!(outcome.status, OperationStatus::Complete);
        assert_eq!(ec2.grant_count(), 1);
        assert_eq!(*elb.registered.lock().unwrap(), vec!["i-1"]);
        assert!(outcome.message.contains("Granted tcp 443-443 on sg-web to sg-lb1"));

        // Second pass finds the peer already granted and issues nothing
        let outcome = adapter.post_provision(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert_eq!(ec2.grant_count(), 1);
    }

    #[tokio::test]
    async fn post_provision_reports_uncovered_requirement() {
        // Group rule covers 8080 only; listener requires 443
        let ec2 = Arc::new(FakeEc2::with_groups(vec![SecurityGroup {
            id: "sg-web".to_string(),
            rules: vec![IngressRule {
                protocol: Protocol::Tcp,
                from_port: 8080,
                to_port: 8080,
                peers: vec![],
            }],
        }]));
        let adapter = ElbAdapter::new(Arc::new(FakeElb::default()), ec2.clone());

        let outcome = adapter.post_provision(&request_with_instance()).await;

        // Registration succeeded, so the composite completes with the
        // configuration problem embedded in the message
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert!(outcome.message.contains("No ingress rule"));
        assert_eq!(ec2.grant_count(), 0);
    }

    #[tokio::test]
    async fn post_provision_fails_when_config_is_invalid() {
        let adapter = ElbAdapter::new(
            Arc::new(FakeElb::default()),
            Arc::new(FakeEc2::with_groups(vec![])),
        );
        let request = LifecycleRequest::new(ServiceInstance::new("lb-svc"));

        let outcome = adapter.post_provision(&request).await;
        assert_eq!(outcome.status, OperationStatus::Failure);
        assert!(outcome.message.contains("Missing required property"));
    }

    #[tokio::test]
    async fn provision_creates_and_reports_dns() {
        let adapter = ElbAdapter::new(
            Arc::new(FakeElb::default()),
            Arc::new(FakeEc2::with_groups(vec![])),
        );

        let outcome = adapter.provision(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert!(outcome.message.contains("front-lb.elb.example.com"));
        assert_eq!(outcome.modified, vec![Entity::service_instance("lb-svc")]);
    }

    #[tokio::test]
    async fn stop_swallows_deregister_failure() {
        let elb = Arc::new(FakeElb {
            deregister_fails: true,
            ..FakeElb::default()
        });
        let adapter = ElbAdapter::new(elb, Arc::new(FakeEc2::with_groups(vec![])));

        let outcome = adapter.stop(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert!(outcome.message.contains("skipped"));
    }

    #[tokio::test]
    async fn release_of_absent_balancer_is_benign() {
        let adapter = ElbAdapter::new(
            Arc::new(FakeElb::default()),
            Arc::new(FakeEc2::with_groups(vec![])),
        );

        let outcome = adapter.release(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert!(outcome.message.contains("already absent"));
    }

    #[tokio::test]
    async fn ping_fails_when_balancer_missing() {
        let adapter = ElbAdapter::new(
            Arc::new(FakeElb::default()),
            Arc::new(FakeEc2::with_groups(vec![])),
        );

        let outcome = adapter.ping(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Failure);
        assert!(outcome.message.contains("does not exist"));
    }

    #[tokio::test]
    async fn sync_reports_missing_registrations() {
        let elb = Arc::new(FakeElb {
            exists: true,
            ..FakeElb::default()
        });
        let adapter = ElbAdapter::new(elb, Arc::new(FakeEc2::with_groups(vec![])));

        let outcome = adapter.sync(&request_with_instance()).await;
        assert_eq!(outcome.status, OperationStatus::Complete);
        assert!(outcome.message.contains("missing registration(s) for: web-1"));
    }
}
