//! Stateless HTTP request builders and response parsers.
//!
//! # Design
//! `DynamicResourceClient` and `DynamicSchemaClient` hold only a base URL and
//! their parsed route templates, and carry no mutable state between calls.
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//!
//! Static operations (find, get, create, ACL) expand a route template.
//! Update, patch and remove resolve the `put`, `patch` and `delete` HAL
//! links of the entity passed in; if the link is absent the build step
//! fails with `ApiError::RelationNotFound` and no request is produced.

mod resource;
mod schema;

pub use resource::DynamicResourceClient;
pub use schema::DynamicSchemaClient;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::hal::HalResource;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::uri_template::{TemplateParams, UriTemplate};

const OK: &[u16] = &[200];
const CREATED: &[u16] = &[201];
const OK_OR_NO_CONTENT: &[u16] = &[200, 204];

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn route_url(
    base_url: &str,
    template: &UriTemplate,
    params: &TemplateParams,
) -> Result<String, ApiError> {
    Ok(format!("{}/{}", base_url, template.try_expand(params)?))
}

fn json_body<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn json_request<T: Serialize + ?Sized>(
    method: HttpMethod,
    url: String,
    body: &T,
) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::new(method, url).with_json_body(json_body(body)?))
}

/// Request against the entity's `rel` link, optionally carrying the entity
/// itself as JSON body.
fn link_request<E: HalResource + Serialize>(
    base_url: &str,
    entity: &E,
    rel: &str,
    method: HttpMethod,
    with_body: bool,
) -> Result<HttpRequest, ApiError> {
    let url = entity.link(rel)?.resolve(base_url, &TemplateParams::new())?;
    tracing::debug!(rel, %url, "resolved HAL link");
    if with_body {
        json_request(method, url, entity)
    } else {
        Ok(HttpRequest::new(method, url))
    }
}

fn access_params(
    mut params: TemplateParams,
    access_action: &str,
    scope: &str,
    principal: &str,
) -> TemplateParams {
    params.insert("accessAction", access_action);
    params.insert(scope, principal);
    params
}

fn fields_params(fields: &[&str]) -> TemplateParams {
    let mut params = TemplateParams::new();
    if !fields.is_empty() {
        params.insert("fields", fields.to_vec());
    }
    params
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse, expected: &[u16]) -> Result<T, ApiError> {
    check_status(&response, expected)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Like `parse_json`, but an empty body (e.g. 204) yields `None`.
fn parse_optional_json<T: DeserializeOwned>(
    response: HttpResponse,
    expected: &[u16],
) -> Result<Option<T>, ApiError> {
    check_status(&response, expected)?;
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn parse_empty(response: HttpResponse, expected: &[u16]) -> Result<(), ApiError> {
    check_status(&response, expected)
}

/// Map unexpected status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: &[u16]) -> Result<(), ApiError> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_status_accepts_any_expected_code() {
        assert!(check_status(&HttpResponse::new(204, ""), OK_OR_NO_CONTENT).is_ok());
        assert!(check_status(&HttpResponse::new(200, ""), OK_OR_NO_CONTENT).is_ok());
        assert!(matches!(
            check_status(&HttpResponse::new(404, ""), OK),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            check_status(&HttpResponse::new(200, ""), CREATED),
            Err(ApiError::HttpError { status: 200, .. })
        ));
    }

    #[test]
    fn optional_json_on_empty_body() {
        let parsed: Option<serde_json::Value> =
            parse_optional_json(HttpResponse::new(204, ""), OK_OR_NO_CONTENT).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        assert_eq!(normalize_base_url("http://h/v1/app//"), "http://h/v1/app");
    }
}
