//! Lifecycle surface - the seam between the platform dispatcher and adapters
//!
//! The platform invokes one hook per lifecycle transition. An adapter
//! overrides only the hooks that mean something for its service; everything
//! else falls through to a successful no-op. Hooks return an outcome, never a
//! Rust error: whatever goes wrong inside an adapter is converted into a
//! failed outcome at the hook boundary.

use async_trait::async_trait;

use crate::domain::{Instance, ServiceInstance};
use crate::outcome::OperationOutcome;

/// The typed request a lifecycle hook receives
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleRequest {
    pub service_instance: ServiceInstance,
    /// Backend instances currently bound to the service instance
    pub instances: Vec<Instance>,
}

impl LifecycleRequest {
    pub fn new(service_instance: ServiceInstance) -> Self {
        Self {
            service_instance,
            instances: Vec::new(),
        }
    }

    pub fn with_instances(mut self, instances: Vec<Instance>) -> Self {
        self.instances = instances;
        self
    }
}

/// One adapter per managed service
///
/// Default hook implementations succeed without doing anything, so an adapter
/// only implements the transitions its service cares about.
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Name of this adapter (e.g., "elb")
    fn name(&self) -> &'static str;

    async fn provision(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn post_provision(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn reconfigure(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn pre_release(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn release(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn start(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn stop(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn ping(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }

    async fn sync(&self, _request: &LifecycleRequest) -> OperationOutcome {
        OperationOutcome::noop()
    }
}
