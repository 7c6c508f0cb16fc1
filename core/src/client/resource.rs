use serde::Serialize;

use super::{
    access_params, fields_params, json_request, link_request, normalize_base_url, parse_empty,
    parse_json, parse_optional_json, route_url, CREATED, OK, OK_OR_NO_CONTENT,
};
use crate::error::ApiError;
use crate::hal::rel;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{FindOptions, GetOptions};
use crate::routes::ResourceRoutes;
use crate::types::{AccessPolicy, DynamicResource, ResourceCollection};
use crate::uri_template::TemplateParams;

/// Synchronous, stateless client for dynamic resource instances.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network. The caller is responsible for executing the HTTP
/// round-trip between `build_*` and `parse_*`.
#[derive(Debug, Clone)]
pub struct DynamicResourceClient {
    base_url: String,
    routes: ResourceRoutes,
}

impl DynamicResourceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            routes: ResourceRoutes::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The route templates used by this client.
    pub fn routes(&self) -> &ResourceRoutes {
        &self.routes
    }

    pub fn build_find(
        &self,
        schema_name: &str,
        options: &FindOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut params = options.to_params();
        params.insert("schemaName", schema_name);
        let url = route_url(&self.base_url, &self.routes.find, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    pub fn build_get(
        &self,
        schema_name: &str,
        id: &str,
        options: &GetOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut params = options.to_params();
        params.insert("schemaName", schema_name);
        params.insert("id", id);
        let url = route_url(&self.base_url, &self.routes.get, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    /// Build a create request; `resource` is any JSON-serializable value.
    pub fn build_create<T: Serialize + ?Sized>(
        &self,
        schema_name: &str,
        resource: &T,
    ) -> Result<HttpRequest, ApiError> {
        let params = TemplateParams::new().with("schemaName", schema_name);
        let url = route_url(&self.base_url, &self.routes.create, &params)?;
        json_request(HttpMethod::Post, url, resource)
    }

    /// PUT the resource to its `put` link.
    pub fn build_update(&self, resource: &DynamicResource) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, resource, rel::PUT, HttpMethod::Put, true)
    }

    /// PATCH the resource to its `patch` link.
    pub fn build_patch(&self, resource: &DynamicResource) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, resource, rel::PATCH, HttpMethod::Patch, true)
    }

    /// DELETE the resource's `delete` link.
    pub fn build_remove(&self, resource: &DynamicResource) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, resource, rel::DELETE, HttpMethod::Delete, false)
    }

    pub fn build_get_permissions(
        &self,
        schema_name: &str,
        id: &str,
        fields: &[&str],
    ) -> Result<HttpRequest, ApiError> {
        let params = self.entity_params(fields_params(fields), schema_name, id);
        let url = route_url(&self.base_url, &self.routes.permissions.get, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    pub fn build_update_permissions(
        &self,
        schema_name: &str,
        id: &str,
        policies: &[AccessPolicy],
    ) -> Result<HttpRequest, ApiError> {
        let params = self.entity_params(TemplateParams::new(), schema_name, id);
        let url = route_url(&self.base_url, &self.routes.permissions.update, &params)?;
        json_request(HttpMethod::Put, url, policies)
    }

    /// Remove every ACL entry granting `access_action` to `user`.
    pub fn build_remove_permissions_by_user(
        &self,
        schema_name: &str,
        id: &str,
        access_action: &str,
        user: &str,
    ) -> Result<HttpRequest, ApiError> {
        let params = access_params(
            self.entity_params(TemplateParams::new(), schema_name, id),
            access_action,
            "user",
            user,
        );
        let url = route_url(&self.base_url, &self.routes.permissions.delete_by_user, &params)?;
        Ok(HttpRequest::new(HttpMethod::Delete, url))
    }

    /// Remove every ACL entry granting `access_action` to `role`.
    pub fn build_remove_permissions_by_role(
        &self,
        schema_name: &str,
        id: &str,
        access_action: &str,
        role: &str,
    ) -> Result<HttpRequest, ApiError> {
        let params = access_params(
            self.entity_params(TemplateParams::new(), schema_name, id),
            access_action,
            "role",
            role,
        );
        let url = route_url(&self.base_url, &self.routes.permissions.delete_by_role, &params)?;
        Ok(HttpRequest::new(HttpMethod::Delete, url))
    }

    pub fn parse_find(
        &self,
        response: HttpResponse,
    ) -> Result<ResourceCollection<DynamicResource>, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<DynamicResource, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<DynamicResource, ApiError> {
        parse_json(response, CREATED)
    }

    /// The updated resource, or `None` when the server answered without a
    /// body.
    pub fn parse_update(&self, response: HttpResponse) -> Result<Option<DynamicResource>, ApiError> {
        parse_optional_json(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_patch(&self, response: HttpResponse) -> Result<Option<DynamicResource>, ApiError> {
        parse_optional_json(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_remove(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_get_permissions(
        &self,
        response: HttpResponse,
    ) -> Result<Vec<AccessPolicy>, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_update_permissions(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }

    /// Parses both `remove_permissions_by_user` and `_by_role` responses.
    pub fn parse_remove_permissions(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }

    fn entity_params(&self, mut params: TemplateParams, schema_name: &str, id: &str) -> TemplateParams {
        params.insert("schemaName", schema_name);
        params.insert("id", id);
        params
    }
}
