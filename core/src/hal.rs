//! HAL link collections and relation lookup.
//!
//! # Design
//! Entities returned by the backend carry a `_links` object mapping relation
//! names to link objects (or arrays of them). Mutating operations never use a
//! static route: they look up the `put`, `patch` or `delete` relation on the
//! entity itself, because the server only advertises actions the caller is
//! allowed to perform on that instance. A missing relation is reported as
//! `ApiError::RelationNotFound`.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::uri_template::{TemplateParams, UriTemplate};

/// Relation names used by the CRUD operations.
pub mod rel {
    pub const SELF: &str = "self";
    pub const PUT: &str = "put";
    pub const PATCH: &str = "patch";
    pub const DELETE: &str = "delete";
}

/// A single HAL link object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
            title: None,
        }
    }

    /// The link target; templated hrefs are expanded with `params`.
    pub fn expand(&self, params: &TemplateParams) -> Result<String, ApiError> {
        if self.templated {
            Ok(UriTemplate::parse(&self.href)?.expand(params))
        } else {
            Ok(self.href.clone())
        }
    }

    /// Absolute URL of the link target, resolved against `base_url` the way
    /// a browser resolves a reference (RFC 3986): `/x` keeps only the scheme
    /// and authority of the base, `x` lands under the base path, and
    /// absolute hrefs are returned unchanged.
    pub fn resolve(&self, base_url: &str, params: &TemplateParams) -> Result<String, ApiError> {
        resolve_href(base_url, &self.expand(params)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum LinkEntry {
    One(Link),
    Many(Vec<Link>),
}

impl LinkEntry {
    fn as_slice(&self) -> &[Link] {
        match self {
            LinkEntry::One(link) => std::slice::from_ref(link),
            LinkEntry::Many(links) => links,
        }
    }
}

/// Relation name to link(s) mapping, as found under `_links`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<String, LinkEntry>);

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    /// First link registered under `rel`.
    pub fn get(&self, rel: &str) -> Option<&Link> {
        self.all(rel).first()
    }

    /// Every link registered under `rel`; empty when absent.
    pub fn all(&self, rel: &str) -> &[Link] {
        self.0.get(rel).map(LinkEntry::as_slice).unwrap_or(&[])
    }

    /// Like `get`, but an absent relation is an error.
    pub fn require(&self, rel: &str) -> Result<&Link, ApiError> {
        self.get(rel).ok_or_else(|| {
            tracing::debug!(rel, "relation not advertised by the entity");
            ApiError::relation_not_found(rel)
        })
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.get(rel).is_some()
    }

    pub fn insert(&mut self, rel: impl Into<String>, link: Link) {
        self.0.insert(rel.into(), LinkEntry::One(link));
    }

    pub fn rels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Implemented by every entity that carries HAL links.
pub trait HalResource {
    fn links(&self) -> &Links;

    fn link(&self, rel: &str) -> Result<&Link, ApiError> {
        self.links().require(rel)
    }
}

/// The base URL is treated as a directory, so `https://h/v1/app` and
/// `https://h/v1/app/` resolve `resources/x` identically.
pub(crate) fn resolve_href(base_url: &str, href: &str) -> Result<String, ApiError> {
    let invalid = |reason: String| ApiError::InvalidUrl {
        base_url: base_url.to_string(),
        href: href.to_string(),
        reason,
    };
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;
    base.join(href)
        .map(String::from)
        .map_err(|e| invalid(e.to_string()))
}
