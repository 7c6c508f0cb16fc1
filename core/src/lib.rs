//! Client core for a backend's dynamic resource and dynamic schema APIs.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). Static operations expand
//! RFC6570 route templates; update, patch and remove follow the HAL links
//! the server attached to the entity. The async services in `service`
//! compose both halves around a pluggable `HttpTransport`.
//!
//! # Design
//! - Clients are stateless: a base URL plus route templates parsed once.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - A missing HAL relation is `ApiError::RelationNotFound`, raised before
//!   any request exists.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.
//!
//! ```no_run
//! use dynres_core::{DynamicResourceService, ClientConfig, FindOptions};
//!
//! # async fn run() -> Result<(), dynres_core::ApiError> {
//! let service = DynamicResourceService::from_config(&ClientConfig::from_env()?)?;
//! let mut page = service.find("cars", &FindOptions::new().page(1, 10)).await?;
//! if let Some(car) = page.item.pop() {
//!     service.remove(&car).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hal;
pub mod http;
pub mod options;
pub mod routes;
pub mod service;
pub mod transport;
pub mod types;
pub mod uri_template;

pub use client::{DynamicResourceClient, DynamicSchemaClient};
pub use config::ClientConfig;
pub use error::ApiError;
pub use hal::{HalResource, Link, Links};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use options::{FindOptions, GetOptions, OrderDirection};
pub use routes::{PermissionRoutes, ResourceRoutes, SchemaRoutes};
pub use service::{DynamicResourceService, DynamicSchemaService};
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{
    AccessAction, AccessPolicy, DynamicResource, DynamicSchema, EntityId, NewDynamicSchema,
    ResourceCollection,
};
pub use uri_template::{TemplateParams, UriTemplate, UriTemplateError};
