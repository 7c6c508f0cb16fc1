use serde::Serialize;
use serde_json::Value;

use super::{
    access_params, fields_params, json_request, link_request, normalize_base_url, parse_empty,
    parse_json, parse_optional_json, route_url, CREATED, OK, OK_OR_NO_CONTENT,
};
use crate::error::ApiError;
use crate::hal::rel;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{FindOptions, GetOptions};
use crate::routes::SchemaRoutes;
use crate::types::{AccessPolicy, DynamicSchema, NewDynamicSchema, ResourceCollection};
use crate::uri_template::TemplateParams;

/// Synchronous, stateless client for dynamic resource schemas.
///
/// Same build/parse split as `DynamicResourceClient`; schemas are addressed
/// by name instead of by id.
#[derive(Debug, Clone)]
pub struct DynamicSchemaClient {
    base_url: String,
    routes: SchemaRoutes,
}

impl DynamicSchemaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            routes: SchemaRoutes::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn routes(&self) -> &SchemaRoutes {
        &self.routes
    }

    pub fn build_find(&self, options: &FindOptions) -> Result<HttpRequest, ApiError> {
        let url = route_url(&self.base_url, &self.routes.find, &options.to_params())?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    pub fn build_get(&self, name: &str, options: &GetOptions) -> Result<HttpRequest, ApiError> {
        let mut params = options.to_params();
        params.insert("name", name);
        let url = route_url(&self.base_url, &self.routes.get, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    pub fn build_create(&self, schema: &NewDynamicSchema) -> Result<HttpRequest, ApiError> {
        let url = route_url(&self.base_url, &self.routes.create, &TemplateParams::new())?;
        json_request(HttpMethod::Post, url, schema)
    }

    /// Ask the server to infer a JSON Schema from a sample document.
    pub fn build_generate<T: Serialize + ?Sized>(&self, sample: &T) -> Result<HttpRequest, ApiError> {
        let url = route_url(&self.base_url, &self.routes.generate, &TemplateParams::new())?;
        json_request(HttpMethod::Post, url, sample)
    }

    pub fn build_update(&self, schema: &DynamicSchema) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, schema, rel::PUT, HttpMethod::Put, true)
    }

    pub fn build_patch(&self, schema: &DynamicSchema) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, schema, rel::PATCH, HttpMethod::Patch, true)
    }

    pub fn build_remove(&self, schema: &DynamicSchema) -> Result<HttpRequest, ApiError> {
        link_request(&self.base_url, schema, rel::DELETE, HttpMethod::Delete, false)
    }

    pub fn build_get_permissions(&self, name: &str, fields: &[&str]) -> Result<HttpRequest, ApiError> {
        let mut params = fields_params(fields);
        params.insert("name", name);
        let url = route_url(&self.base_url, &self.routes.permissions.get, &params)?;
        Ok(HttpRequest::new(HttpMethod::Get, url))
    }

    pub fn build_update_permissions(
        &self,
        name: &str,
        policies: &[AccessPolicy],
    ) -> Result<HttpRequest, ApiError> {
        let params = TemplateParams::new().with("name", name);
        let url = route_url(&self.base_url, &self.routes.permissions.update, &params)?;
        json_request(HttpMethod::Put, url, policies)
    }

    pub fn build_remove_permissions_by_user(
        &self,
        name: &str,
        access_action: &str,
        user: &str,
    ) -> Result<HttpRequest, ApiError> {
        let params = access_params(TemplateParams::new().with("name", name), access_action, "user", user);
        let url = route_url(&self.base_url, &self.routes.permissions.delete_by_user, &params)?;
        Ok(HttpRequest::new(HttpMethod::Delete, url))
    }

    pub fn build_remove_permissions_by_role(
        &self,
        name: &str,
        access_action: &str,
        role: &str,
    ) -> Result<HttpRequest, ApiError> {
        let params = access_params(TemplateParams::new().with("name", name), access_action, "role", role);
        let url = route_url(&self.base_url, &self.routes.permissions.delete_by_role, &params)?;
        Ok(HttpRequest::new(HttpMethod::Delete, url))
    }

    pub fn parse_find(
        &self,
        response: HttpResponse,
    ) -> Result<ResourceCollection<DynamicSchema>, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<DynamicSchema, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<DynamicSchema, ApiError> {
        parse_json(response, CREATED)
    }

    /// The generated JSON Schema document.
    pub fn parse_generate(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<Option<DynamicSchema>, ApiError> {
        parse_optional_json(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_patch(&self, response: HttpResponse) -> Result<Option<DynamicSchema>, ApiError> {
        parse_optional_json(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_remove(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_get_permissions(&self, response: HttpResponse) -> Result<Vec<AccessPolicy>, ApiError> {
        parse_json(response, OK)
    }

    pub fn parse_update_permissions(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }

    pub fn parse_remove_permissions(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(response, OK_OR_NO_CONTENT)
    }
}
