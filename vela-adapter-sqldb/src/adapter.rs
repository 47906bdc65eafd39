//! SQL database lifecycle implementation
//!
//! All provider interaction goes through `RestTransport`; the adapter never
//! sees an HTTP client. A database cannot be renamed in place, so reconfigure
//! refuses a name change before touching the provider at all.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use vela_core::{
    AdapterError, AdapterResult, Entity, LifecycleRequest, OperationOutcome, RestResponse,
    RestTransport, ServiceAdapter,
};

use crate::config::SqlDatabaseConfig;

/// Adapter for a managed SQL database
pub struct SqlDbAdapter {
    transport: Arc<dyn RestTransport>,
    base_uri: String,
}

impl SqlDbAdapter {
    pub fn new(transport: Arc<dyn RestTransport>, base_uri: impl Into<String>) -> Self {
        Self {
            transport,
            base_uri: base_uri.into(),
        }
    }

    fn database_uri(&self, config: &SqlDatabaseConfig) -> String {
        format!(
            "{}/servers/{}/databases/{}",
            self.base_uri.trim_end_matches('/'),
            config.server_name,
            config.database_name
        )
    }

    fn settings_body(config: &SqlDatabaseConfig) -> Value {
        let mut body = json!({
            "name": config.database_name,
            "edition": config.edition.as_str(),
            "maxSizeGb": config.max_size_gb,
        });
        if let Some(collation) = &config.collation {
            body["collation"] = json!(collation);
        }
        body
    }

    fn parse_config(request: &LifecycleRequest) -> AdapterResult<SqlDatabaseConfig> {
        SqlDatabaseConfig::from_properties(&request.service_instance.properties)
    }

    async fn read_database(&self, config: &SqlDatabaseConfig) -> AdapterResult<Option<Value>> {
        let response = self.transport.get(&self.database_uri(config)).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(provider_error(&response));
        }
        Ok(Some(response.body))
    }

    async fn write_settings(&self, config: &SqlDatabaseConfig) -> AdapterResult<()> {
        log::debug!(
            "writing settings for database {} ({}, {} GB)",
            config.database_name,
            config.edition.as_str(),
            config.max_size_gb
        );

        let response = self
            .transport
            .post(&self.database_uri(config), Self::settings_body(config))
            .await?;
        if !response.is_success() {
            return Err(provider_error(&response));
        }
        Ok(())
    }
}

fn provider_error(response: &RestResponse) -> AdapterError {
    let message = response
        .body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("provider request failed")
        .to_string();
    AdapterError::provider(response.status, message)
}

#[async_trait]
impl ServiceAdapter for SqlDbAdapter {
    fn name(&self) -> &'static str {
        "sqldb"
    }

    /// Create the database; creating one that already exists is benign
    async fn provision(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match Self::parse_config(request) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.read_database(&config).await {
            Ok(Some(_)) => {
                return OperationOutcome::complete(format!(
                    "Database {} already exists on {}",
                    config.database_name, config.server_name
                ));
            }
            Ok(None) => {}
            Err(e) => return OperationOutcome::failure(e.to_string()),
        }

        match self.write_settings(&config).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Created database {} on {} ({}, {} GB)",
                config.database_name,
                config.server_name,
                config.edition.as_str(),
                config.max_size_gb
            ))
            .with_modified(vec![Entity::service_instance(
                &request.service_instance.name,
            )]),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to create database {}: {}",
                config.database_name, e
            )),
        }
    }

    /// Apply changed settings; a rename is refused before any provider call
    async fn reconfigure(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match Self::parse_config(request) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        if config.is_rename() {
            let provisioned = config.provisioned_name.as_deref().unwrap_or_default();
            return OperationOutcome::failure(
                AdapterError::configuration(format!(
                    "database {} cannot be renamed to {}; the provider does not \
                     support renaming a database in place",
                    provisioned, config.database_name
                ))
                .to_string(),
            );
        }

        match self.write_settings(&config).await {
            Ok(()) => OperationOutcome::complete(format!(
                "Reconfigured database {} ({}, {} GB)",
                config.database_name,
                config.edition.as_str(),
                config.max_size_gb
            ))
            .with_modified(vec![Entity::service_instance(
                &request.service_instance.name,
            )]),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to reconfigure database {}: {}",
                config.database_name, e
            )),
        }
    }

    /// Delete the database; an already-absent database is nothing to do
    async fn release(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match Self::parse_config(request) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let uri = format!("{}/delete", self.database_uri(&config));
        let response = match self.transport.post(&uri, Value::Null).await {
            Ok(response) => response,
            Err(e) => {
                return OperationOutcome::failure(format!(
                    "Failed to delete database {}: {}",
                    config.database_name, e
                ));
            }
        };

        if response.is_not_found() {
            log::warn!(
                "delete of database {} found nothing to delete, continuing",
                config.database_name
            );
            return OperationOutcome::complete(format!(
                "Database {} is already absent",
                config.database_name
            ));
        }
        if !response.is_success() {
            return OperationOutcome::failure(format!(
                "Failed to delete database {}: {}",
                config.database_name,
                provider_error(&response)
            ));
        }

        OperationOutcome::complete(format!("Deleted database {}", config.database_name))
            .with_modified(vec![Entity::service_instance(
                &request.service_instance.name,
            )])
    }

    /// Existence check; a missing or unreadable database is a failed ping
    async fn ping(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match Self::parse_config(request) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        match self.read_database(&config).await {
            Ok(Some(_)) => OperationOutcome::complete(format!(
                "Database {} is present on {}",
                config.database_name, config.server_name
            )),
            Ok(None) => OperationOutcome::failure(format!(
                "Database {} does not exist on {}",
                config.database_name, config.server_name
            )),
            Err(e) => OperationOutcome::failure(format!(
                "Failed to read database {}: {}",
                config.database_name, e
            )),
        }
    }

    /// Report drift between the configured and provider-side settings
    async fn sync(&self, request: &LifecycleRequest) -> OperationOutcome {
        let config = match Self::parse_config(request) {
            Ok(config) => config,
            Err(e) => return OperationOutcome::failure(e.to_string()),
        };

        let actual = match self.read_database(&config).await {
            Ok(Some(actual)) => actual,
            Ok(None) => {
                return OperationOutcome::failure(format!(
                    "Database {} does not exist on {}",
                    config.database_name, config.server_name
                ));
            }
            Err(e) => {
                return OperationOutcome::failure(format!(
                    "Failed to read database {}: {}",
                    config.database_name, e
                ));
            }
        };

        let mut drift = Vec::new();
        if actual.get("edition").and_then(Value::as_str) != Some(config.edition.as_str()) {
            drift.push("edition");
        }
        if actual.get("maxSizeGb").and_then(Value::as_i64) != Some(config.max_size_gb) {
            drift.push("maxSizeGb");
        }

        if drift.is_empty() {
            OperationOutcome::complete(format!("Database {} is in sync", config.database_name))
        } else {
            OperationOutcome::complete(format!(
                "Database {} has drifted: {}",
                config.database_name,
                drift.join(", ")
            ))
        }
    }
}
