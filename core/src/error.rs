//! Error types for the dynamic resource client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." `RelationNotFound` is raised before any request is built when a
//! HAL-driven operation (update, patch, remove) targets an entity whose
//! `_links` lack the relation: the server decides per instance which actions
//! are available. All other non-2xx responses land in `HttpError` with the
//! raw status code and body for debugging.

use thiserror::Error;

use crate::uri_template::UriTemplateError;

/// Errors returned by the request builders, response parsers and services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The entity carries no link for the requested relation, so the
    /// operation is not available for it.
    #[error("operation not available for this resource: no `{rel}` link")]
    RelationNotFound { rel: String },

    /// The server returned a status other than the expected ones and 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A route template could not be parsed or a required path variable
    /// was missing.
    #[error(transparent)]
    Template(#[from] UriTemplateError),

    /// The transport failed before a response was received.
    #[error("transport failed: {0}")]
    Transport(String),

    /// A link href could not be resolved against the base URL.
    #[error("cannot resolve `{href}` against `{base_url}`: {reason}")]
    InvalidUrl {
        base_url: String,
        href: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub(crate) fn relation_not_found(rel: &str) -> Self {
        ApiError::RelationNotFound {
            rel: rel.to_string(),
        }
    }

    /// True when the error means the action is not permitted or not
    /// applicable for the entity it was attempted on.
    pub fn is_unavailable_operation(&self) -> bool {
        matches!(self, ApiError::RelationNotFound { .. })
    }
}
