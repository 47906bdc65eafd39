//! REST-backed document store for profile definitions

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vela_core::RestTransport;
use vela_lock::{DocumentStore, StoreError};

/// Stores profile documents through the provider's REST surface
///
/// A 404 on read is "the profile does not exist", not a failure; writes are
/// whole-document posts; deletion is the provider's delete action, which this
/// control plane models as a post.
pub struct RestDocumentStore {
    transport: Arc<dyn RestTransport>,
    base_uri: String,
}

impl RestDocumentStore {
    pub fn new(transport: Arc<dyn RestTransport>, base_uri: impl Into<String>) -> Self {
        Self {
            transport,
            base_uri: base_uri.into(),
        }
    }

    fn profile_uri(&self, key: &str) -> String {
        format!("{}/profiles/{}", self.base_uri.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn fetch(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let uri = self.profile_uri(key);
        let response = self
            .transport
            .get(&uri)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(StoreError::Backend(format!(
                "GET {} returned status {}",
                uri, response.status
            )));
        }

        Ok(Some(response.body))
    }

    async fn store(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        let uri = self.profile_uri(key);
        let response = self
            .transport
            .post(&uri, document.clone())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.is_success() {
            return Err(StoreError::Backend(format!(
                "POST {} returned status {}",
                uri, response.status
            )));
        }

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let uri = format!("{}/delete", self.profile_uri(key));
        let response = self
            .transport
            .post(&uri, Value::Null)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.is_success() && !response.is_not_found() {
            return Err(StoreError::Backend(format!(
                "POST {} returned status {}",
                uri, response.status
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;
    use vela_core::{AdapterResult, RestResponse};

    /// Transport double backed by a uri -> document map
    #[derive(Default)]
    struct FakeTransport {
        documents: Mutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl RestTransport for FakeTransport {
        async fn get(&self, uri: &str) -> AdapterResult<RestResponse> {
            match self.documents.lock().unwrap().get(uri) {
                Some(body) => Ok(RestResponse::new(200, body.clone())),
                None => Ok(RestResponse::new(404, Value::Null)),
            }
        }

        async fn post(&self, uri: &str, body: Value) -> AdapterResult<RestResponse> {
            let mut documents = self.documents.lock().unwrap();
            if let Some(target) = uri.strip_suffix("/delete") {
                documents.remove(target);
            } else {
                documents.insert(uri.to_string(), body);
            }
            Ok(RestResponse::ok())
        }
    }

    #[tokio::test]
    async fn fetch_store_remove_cycle() {
        let transport = Arc::new(FakeTransport::default());
        let store = RestDocumentStore::new(transport, "https://api.example.com/");

        assert_eq!(store.fetch("profile-x").await.unwrap(), None);

        let document = json!({"name": "profile-x", "endpoints": []});
        store.store("profile-x", &document).await.unwrap();
        assert_eq!(store.fetch("profile-x").await.unwrap(), Some(document));

        store.remove("profile-x").await.unwrap();
        assert_eq!(store.fetch("profile-x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn removing_an_absent_profile_is_benign() {
        let transport = Arc::new(FakeTransport::default());
        let store = RestDocumentStore::new(transport, "https://api.example.com");

        store.remove("profile-x").await.unwrap();
    }
}
