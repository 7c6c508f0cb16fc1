//! Async façades composing request building, transport and parsing.
//!
//! Each method issues exactly one request and hands back the parsed result
//! unchanged: no retries, no caching, no state between calls.

use serde::Serialize;
use serde_json::Value;

use crate::client::{DynamicResourceClient, DynamicSchemaClient};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::options::{FindOptions, GetOptions};
use crate::routes::{ResourceRoutes, SchemaRoutes};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{AccessPolicy, DynamicResource, DynamicSchema, NewDynamicSchema, ResourceCollection};

/// Dynamic resource operations over an `HttpTransport`.
#[derive(Debug, Clone)]
pub struct DynamicResourceService<T = ReqwestTransport> {
    client: DynamicResourceClient,
    transport: T,
}

impl DynamicResourceService<ReqwestTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self::new(
            DynamicResourceClient::new(&config.base_url),
            ReqwestTransport::new(config)?,
        ))
    }
}

impl<T: HttpTransport> DynamicResourceService<T> {
    pub fn new(client: DynamicResourceClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &DynamicResourceClient {
        &self.client
    }

    pub fn routes(&self) -> &ResourceRoutes {
        self.client.routes()
    }

    pub async fn find(
        &self,
        schema_name: &str,
        options: &FindOptions,
    ) -> Result<ResourceCollection<DynamicResource>, ApiError> {
        let request = self.client.build_find(schema_name, options)?;
        self.client.parse_find(self.transport.execute(request).await?)
    }

    pub async fn get(
        &self,
        schema_name: &str,
        id: &str,
        options: &GetOptions,
    ) -> Result<DynamicResource, ApiError> {
        let request = self.client.build_get(schema_name, id, options)?;
        self.client.parse_get(self.transport.execute(request).await?)
    }

    pub async fn create<B: Serialize + ?Sized + Sync>(
        &self,
        schema_name: &str,
        resource: &B,
    ) -> Result<DynamicResource, ApiError> {
        let request = self.client.build_create(schema_name, resource)?;
        self.client.parse_create(self.transport.execute(request).await?)
    }

    pub async fn update(
        &self,
        resource: &DynamicResource,
    ) -> Result<Option<DynamicResource>, ApiError> {
        let request = self.client.build_update(resource)?;
        self.client.parse_update(self.transport.execute(request).await?)
    }

    pub async fn patch(
        &self,
        resource: &DynamicResource,
    ) -> Result<Option<DynamicResource>, ApiError> {
        let request = self.client.build_patch(resource)?;
        self.client.parse_patch(self.transport.execute(request).await?)
    }

    pub async fn remove(&self, resource: &DynamicResource) -> Result<(), ApiError> {
        let request = self.client.build_remove(resource)?;
        self.client.parse_remove(self.transport.execute(request).await?)
    }

    /// ACL operations on a single resource.
    pub fn permissions(&self) -> ResourcePermissions<'_, T> {
        ResourcePermissions { service: self }
    }
}

pub struct ResourcePermissions<'a, T> {
    service: &'a DynamicResourceService<T>,
}

impl<T: HttpTransport> ResourcePermissions<'_, T> {
    pub async fn get(
        &self,
        schema_name: &str,
        id: &str,
        fields: &[&str],
    ) -> Result<Vec<AccessPolicy>, ApiError> {
        let client = &self.service.client;
        let request = client.build_get_permissions(schema_name, id, fields)?;
        client.parse_get_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn update(
        &self,
        schema_name: &str,
        id: &str,
        policies: &[AccessPolicy],
    ) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_update_permissions(schema_name, id, policies)?;
        client.parse_update_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn remove_by_user(
        &self,
        schema_name: &str,
        id: &str,
        access_action: &str,
        user: &str,
    ) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_remove_permissions_by_user(schema_name, id, access_action, user)?;
        client.parse_remove_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn remove_by_role(
        &self,
        schema_name: &str,
        id: &str,
        access_action: &str,
        role: &str,
    ) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_remove_permissions_by_role(schema_name, id, access_action, role)?;
        client.parse_remove_permissions(self.service.transport.execute(request).await?)
    }
}

/// Dynamic schema operations over an `HttpTransport`.
#[derive(Debug, Clone)]
pub struct DynamicSchemaService<T = ReqwestTransport> {
    client: DynamicSchemaClient,
    transport: T,
}

impl DynamicSchemaService<ReqwestTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self::new(
            DynamicSchemaClient::new(&config.base_url),
            ReqwestTransport::new(config)?,
        ))
    }
}

impl<T: HttpTransport> DynamicSchemaService<T> {
    pub fn new(client: DynamicSchemaClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &DynamicSchemaClient {
        &self.client
    }

    pub fn routes(&self) -> &SchemaRoutes {
        self.client.routes()
    }

    pub async fn find(&self, options: &FindOptions) -> Result<ResourceCollection<DynamicSchema>, ApiError> {
        let request = self.client.build_find(options)?;
        self.client.parse_find(self.transport.execute(request).await?)
    }

    pub async fn get(&self, name: &str, options: &GetOptions) -> Result<DynamicSchema, ApiError> {
        let request = self.client.build_get(name, options)?;
        self.client.parse_get(self.transport.execute(request).await?)
    }

    pub async fn create(&self, schema: &NewDynamicSchema) -> Result<DynamicSchema, ApiError> {
        let request = self.client.build_create(schema)?;
        self.client.parse_create(self.transport.execute(request).await?)
    }

    pub async fn generate<B: Serialize + ?Sized + Sync>(&self, sample: &B) -> Result<Value, ApiError> {
        let request = self.client.build_generate(sample)?;
        self.client.parse_generate(self.transport.execute(request).await?)
    }

    pub async fn update(&self, schema: &DynamicSchema) -> Result<Option<DynamicSchema>, ApiError> {
        let request = self.client.build_update(schema)?;
        self.client.parse_update(self.transport.execute(request).await?)
    }

    pub async fn patch(&self, schema: &DynamicSchema) -> Result<Option<DynamicSchema>, ApiError> {
        let request = self.client.build_patch(schema)?;
        self.client.parse_patch(self.transport.execute(request).await?)
    }

    pub async fn remove(&self, schema: &DynamicSchema) -> Result<(), ApiError> {
        let request = self.client.build_remove(schema)?;
        self.client.parse_remove(self.transport.execute(request).await?)
    }

    /// ACL operations on a single schema.
    pub fn permissions(&self) -> SchemaPermissions<'_, T> {
        SchemaPermissions { service: self }
    }
}

pub struct SchemaPermissions<'a, T> {
    service: &'a DynamicSchemaService<T>,
}

impl<T: HttpTransport> SchemaPermissions<'_, T> {
    pub async fn get(&self, name: &str, fields: &[&str]) -> Result<Vec<AccessPolicy>, ApiError> {
        let client = &self.service.client;
        let request = client.build_get_permissions(name, fields)?;
        client.parse_get_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn update(&self, name: &str, policies: &[AccessPolicy]) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_update_permissions(name, policies)?;
        client.parse_update_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn remove_by_user(&self, name: &str, access_action: &str, user: &str) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_remove_permissions_by_user(name, access_action, user)?;
        client.parse_remove_permissions(self.service.transport.execute(request).await?)
    }

    pub async fn remove_by_role(&self, name: &str, access_action: &str, role: &str) -> Result<(), ApiError> {
        let client = &self.service.client;
        let request = client.build_remove_permissions_by_role(name, access_action, role)?;
        client.parse_remove_permissions(self.service.transport.execute(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// Records every request and replays canned responses in order.
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<HttpRequest>>,
        responses: Mutex<VecDeque<HttpResponse>>,
    }

    impl RecordingTransport {
        fn replying(responses: Vec<HttpResponse>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Transport("no canned response".into()))
        }
    }

    fn resource_service(responses: Vec<HttpResponse>) -> DynamicResourceService<RecordingTransport> {
        DynamicResourceService::new(
            DynamicResourceClient::new("http://api.test"),
            RecordingTransport::replying(responses),
        )
    }

    fn linked_resource() -> DynamicResource {
        serde_json::from_value(json!({
            "id": "42",
            "make": "Volvo",
            "_links": {
                "put": {"href": "/resources/cars/42"},
                "patch": {"href": "/resources/cars/42"},
                "delete": {"href": "/resources/cars/42"}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_issues_one_post_with_body() {
        let service = resource_service(vec![HttpResponse::new(201, r#"{"id":"1","make":"Saab"}"#)]);
        let created = service.create("cars", &json!({"make": "Saab"})).await.unwrap();
        assert_eq!(created.id, Some("1".into()));

        let requests = service.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "http://api.test/resources/cars");
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"make":"Saab"}"#));
    }

    #[tokio::test]
    async fn update_issues_one_put() {
        let service = resource_service(vec![HttpResponse::new(204, "")]);
        assert!(service.update(&linked_resource()).await.unwrap().is_none());

        let requests = service.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Put);
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"id": "42", "make": "Volvo"}));
    }

    #[tokio::test]
    async fn remove_issues_one_delete() {
        let service = resource_service(vec![HttpResponse::new(204, "")]);
        service.remove(&linked_resource()).await.unwrap();

        let requests = service.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert!(requests[0].body.is_none());
    }

    #[tokio::test]
    async fn missing_link_sends_nothing() {
        let service = resource_service(Vec::new());
        let err = service.patch(&DynamicResource::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::RelationNotFound { ref rel } if rel == "patch"));
        assert!(service.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn http_errors_pass_through() {
        let service = resource_service(vec![HttpResponse::new(503, "unavailable")]);
        let err = service.get("cars", "1", &GetOptions::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 503, .. }));
    }

    #[tokio::test]
    async fn permissions_remove_by_user() {
        let service = resource_service(vec![HttpResponse::new(204, "")]);
        service
            .permissions()
            .remove_by_user("cars", "42", "Read", "jdoe")
            .await
            .unwrap();
        let requests = service.transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert_eq!(
            requests[0].url,
            "http://api.test/resources/cars/42/permissions/actions/Read/users/jdoe/"
        );
    }

    #[tokio::test]
    async fn schema_generate_and_acl() {
        let service = DynamicSchemaService::new(
            DynamicSchemaClient::new("http://api.test"),
            RecordingTransport::replying(vec![
                HttpResponse::new(200, r#"{"type":"object"}"#),
                HttpResponse::new(200, r#"[{"role":"Admins","actions":[{"abrv":"Full"}]}]"#),
            ]),
        );
        let generated = service.generate(&json!({"make": "Volvo"})).await.unwrap();
        assert_eq!(generated["type"], "object");

        let policies = service.permissions().get("cars", &[]).await.unwrap();
        assert_eq!(policies[0].role.as_deref(), Some("Admins"));

        let requests = service.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "http://api.test/schemas/cars/acl/");
    }
}
