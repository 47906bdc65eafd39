//! Traffic-profile lifecycle implementation
//!
//! Concurrent lifecycle events (instances joining and leaving, starts and
//! stops) race on the same profile definition, so every mutation is a locked
//! read-modify-write keyed by the profile name. Unrelated profiles are never
//! serialized against each other.

use std::sync::Arc;

use async_trait::async_trait;

use vela_core::{
    AdapterResult, Entity, Instance, LifecycleRequest, OperationOutcome, ServiceAdapter,
    aggregate,
};
use vela_lock::{DocUpdate, DocumentStore, LockService, LockedUpdater, UpdateError};

use crate::config::TrafficConfig;
use crate::profile::{Endpoint, EndpointStatus, TrafficProfile};

/// Adapter for a DNS traffic-routing profile
pub struct TrafficAdapter {
    updater: LockedUpdater,
    store: Arc<dyn DocumentStore>,
}

impl TrafficAdapter {
    pub fn new(locks: Arc<dyn LockService>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            updater: LockedUpdater::new(locks, Arc::clone(&store)),
            store,
        }
    }

    fn endpoint_for(instance: &Instance) -> AdapterResult<Endpoint> {
        let target = instance.properties.require_string("address")?;
        Ok(Endpoint {
            name: instance.name.clone(),
            target: target.to_string(),
            status: EndpointStatus::Enabled,
        })
    }

    /// Add or replace one endpoint under the profile lock
    async fn add_endpoint(
        &self,
        profile_name: &str,
        endpoint: Endpoint,
    ) -> Result<(), UpdateError> {
        self.updater
            .with_lock(profile_name, "post-provision", move |current| async move {
                let Some(document) = current else {
                    return Err(UpdateError::Aborted(
                        "profile does not exist".to_string(),
                    ));
                };
                let mut profile = TrafficProfile::from_value(document)?;
                profile.upsert_endpoint(endpoint);
                Ok((DocUpdate::Replace(profile.to_value()?), ()))
            })
            .await
    }

    /// Flip one endpoint's status under the profile lock
    ///
    /// A missing profile or endpoint is nothing-to-do: a stop must not be
    /// blocked by routing state that is already gone.
    async fn set_status(
        &self,
        profile_name: &str,
        endpoint_name: String,
        status: EndpointStatus,
    ) -> Result<String, UpdateError> {
        self.updater
            .with_lock(profile_name, "set-status", move |current| async move {
                let Some(document) = current else {
                    return Ok((DocUpdate::Keep, "profile absent, nothing to do".to_string()));
                };
                let mut profile = TrafficProfile::from_value(document)?;
                if profile.set_endpoint_status(&endpoint_name, status) {
                    let message = format!("endpoint {} is now {:?}", endpoint_name, status);
                    Ok((DocUpdate::Replace(profile.to_value()?), message))
                } else {
                    Ok((
                        DocUpdate::Keep,
                        format!("endpoint {} not present, nothing to do", endpoint_name),
                    ))
                }
            })
            .await
    }

    async fn set_status_all(
        &self,
        request: &LifecycleRequest,
        status: EndpointStatus,
    ) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let mut outcomes = Vec::new();
        for instance in &request.instances {
            match self
                .set_status(&config.profile_name, instance.name.clone(), status)
                .await
            {
                Ok(message) => outcomes.push(
                    OperationOutcome::complete(message)
                        .with_modified(vec![Entity::instance(&instance.name)]),
                ),
                Err(e) => outcomes.push(OperationOutcome::failure(e.to_string())),
            }
        }

        aggregate(outcomes, false)
    }
}

#[async_trait]
impl ServiceAdapter for TrafficAdapter {
    fn name(&self) -> &'static str {
        "traffic"
    }

    /// Create the profile definition if it does not exist yet
    async fn provision(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let profile = TrafficProfile::from_config(&config);
        let result = self
            .updater
            .with_lock(&config.profile_name, "provision", move |current| async move {
                if current.is_some() {
                    // Another provision already created it
                    return Ok((DocUpdate::Keep, true));
                }
                Ok((DocUpdate::Replace(profile.to_value()?), false))
            })
            .await;

        match result {
            Ok(true) => OperationOutcome::complete(format!(
                "Profile {} already exists",
                config.profile_name
            )),
            Ok(false) => OperationOutcome::complete(format!(
                "Created profile {} for {}",
                config.profile_name, config.dns_name
            ))
            .with_modified(vec![Entity::service_instance(&request.service_instance.name)]),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to create profile {}: {}",
                config.profile_name, e
            )),
        }
    }

    /// Add one endpoint per backend instance
    async fn post_provision(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let mut outcomes = Vec::new();
        for instance in &request.instances {
            let endpoint = match Self::endpoint_for(instance) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    outcomes.push(OperationOutcome::failure(format!(
                        "Instance {}: {}",
                        instance.name, e
                    )));
                    continue;
                }
            };

            match self.add_endpoint(&config.profile_name, endpoint).await {
                Ok(()) => outcomes.push(
                    OperationOutcome::complete(format!(
                        "Added endpoint {} to {}",
                        instance.name, config.profile_name
                    ))
                    .with_modified(vec![Entity::instance(&instance.name)]),
                ),
                Err(e) => outcomes.push(OperationOutcome::failure(format!(
                    "Failed to add endpoint {}: {}",
                    instance.name, e
                ))),
            }
        }

        aggregate(outcomes, false)
    }

    async fn start(&self, request: &LifecycleRequest) -> OperationOutcome {
        self.set_status_all(request, EndpointStatus::Enabled).await
    }

    async fn stop(&self, request: &LifecycleRequest) -> OperationOutcome {
        self.set_status_all(request, EndpointStatus::Disabled).await
    }

    /// Remove departing instances' endpoints, best-effort
    async fn pre_release(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let mut outcomes = Vec::new();
        for instance in &request.instances {
            let endpoint_name = instance.name.clone();
            let result = self
                .updater
                .with_lock(&config.profile_name, "pre-release", move |current| async move {
                    let Some(document) = current else {
                        return Ok((DocUpdate::Keep, false));
                    };
                    let mut profile = TrafficProfile::from_value(document)?;
                    if profile.remove_endpoint(&endpoint_name) {
                        Ok((DocUpdate::Replace(profile.to_value()?), true))
                    } else {
                        Ok((DocUpdate::Keep, false))
                    }
                })
                .await;

            match result {
                Ok(true) => outcomes.push(
                    OperationOutcome::complete(format!(
                        "Removed endpoint {} from {}",
                        instance.name, config.profile_name
                    ))
                    .with_modified(vec![Entity::instance(&instance.name)]),
                ),
                Ok(false) => outcomes.push(OperationOutcome::complete(format!(
                    "Endpoint {} already absent",
                    instance.name
                ))),
                Err(e) => {
                    log::warn!(
                        "removing endpoint {} from {} failed, continuing: {}",
                        instance.name,
                        config.profile_name,
                        e
                    );
                    outcomes.push(OperationOutcome::complete(format!(
                        "Endpoint {} removal failed and was skipped: {}",
                        instance.name, e
                    )));
                }
            }
        }

        aggregate(outcomes, false)
    }

    /// Delete the profile definition
    async fn release(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let result = self
            .updater
            .with_lock(&config.profile_name, "release", |current| async move {
                if current.is_none() {
                    return Ok((DocUpdate::Keep, false));
                }
                Ok((DocUpdate::Remove, true))
            })
            .await;

        match result {
            Ok(true) => {
                OperationOutcome::complete(format!("Deleted profile {}", config.profile_name))
                    .with_modified(vec![Entity::service_instance(
                        &request.service_instance.name,
                    )])
            }
            Ok(false) => OperationOutcome::complete(format!(
                "Profile {} is already absent",
                config.profile_name
            )),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to delete profile {}: {}",
                config.profile_name, e
            )),
        }
    }

    /// Read-only reachability check; takes no lock
    async fn ping(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.store.fetch(&config.profile_name).await {
            Ok(Some(_)) => OperationOutcome::complete(format!(
                "Profile {} is present",
                config.profile_name
            )),
            Ok(None) => OperationOutcome::failure(format!(
                "Profile {} does not exist",
                config.profile_name
            )),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to read profile {}: {}",
                config.profile_name, e
            )),
        }
    }

    /// Compare the platform's instance set against the profile's endpoints
    async fn sync(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match TrafficConfig::from_properties(&request.service_instance.properties)
        {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let profile = match self.store.fetch(&config.profile_name).await {
            Ok(Some(document)) => match TrafficProfile::from_value(document) {
                Ok(profile) => profile,
                Err(e) => return OperationOutcome::failure(e.to_string()),
            },
            Ok(None) => {
                return OperationOutcome::failure(format!(
                    "Profile {} does not exist",
                    config.profile_name
                ));
            }
            Err(e) => {
                return OperationOutcome::failure(format!(
                    "Failed to read profile {}: {}",
                    config.profile_name, e
                ));
            }
        };

        let missing: Vec<&str> = request
            .instances
            .iter()
            .filter(|i| !profile.endpoints.iter().any(|e| e.name == i.name))
            .map(|i| i.name.as_str())
            .collect();

        if missing.is_empty() {
            OperationOutcome::complete(format!(
                "Profile {} is in sync ({} endpoint(s))",
                config.profile_name,
                profile.endpoints.len()
            ))
        } else {
            OperationOutcome::complete(format!(
                "Profile {} is missing endpoint(s) for: {}",
                config.profile_name,
                missing.join(", ")
            ))
        }
    }
}
