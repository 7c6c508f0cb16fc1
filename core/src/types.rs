//! Entity DTOs for the dynamic resource and dynamic schema APIs.
//!
//! # Design
//! Dynamic resources are schemaless from the client's point of view, so
//! `DynamicResource` keeps everything except `id` and `_links` in a JSON map.
//! `_links` is read from responses but never written into request bodies:
//! links are the server's view of the entity, not part of its data.
//!
//! The mock server defines its own wire types; integration tests catch any
//! drift between the two.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::hal::{HalResource, Links};

/// Entity identifier as issued by the backend: a string (GUID, slug) or a
/// number. Kept as received so it serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Text(String),
    Number(Number),
}

impl EntityId {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntityId::Text(text) => Some(text),
            EntityId::Number(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Text(text) => f.write_str(text),
            EntityId::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for EntityId {
    fn from(text: &str) -> Self {
        EntityId::Text(text.to_string())
    }
}

impl From<String> for EntityId {
    fn from(text: String) -> Self {
        EntityId::Text(text)
    }
}

impl From<u64> for EntityId {
    fn from(number: u64) -> Self {
        EntityId::Number(number.into())
    }
}

impl From<i64> for EntityId {
    fn from(number: i64) -> Self {
        EntityId::Number(number.into())
    }
}

/// A dynamic resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(rename = "_links", alias = "links", default, skip_serializing)]
    pub links: Links,
}

impl DynamicResource {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            id: None,
            fields,
            links: Links::default(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }
}

impl HalResource for DynamicResource {
    fn links(&self) -> &Links {
        &self.links
    }
}

/// A dynamic resource schema definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the resources stored under this schema.
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub enforce_schema_validation: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(rename = "_links", alias = "links", default, skip_serializing)]
    pub links: Links,
}

impl HalResource for DynamicSchema {
    fn links(&self) -> &Links {
        &self.links
    }
}

/// Request payload for creating a schema.
///
/// Properties beyond the common ones (e.g. `readOnly`) travel in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDynamicSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub enforce_schema_validation: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A page of entities returned by a `find` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCollection<T> {
    #[serde(default = "Vec::new")]
    pub item: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub rpp: u32,
    #[serde(default)]
    pub record_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
    #[serde(rename = "_links", alias = "links", default, skip_serializing)]
    pub links: Links,
}

impl<T> ResourceCollection<T> {
    pub fn len(&self) -> usize {
        self.item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_empty()
    }
}

impl<T> HalResource for ResourceCollection<T> {
    fn links(&self) -> &Links {
        &self.links
    }
}

/// An access action granted by a policy, identified by its abbreviation
/// (`Read`, `Update`, `Delete`, `Full`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAction {
    pub abrv: String,
}

impl AccessAction {
    pub fn new(abrv: impl Into<String>) -> Self {
        Self { abrv: abrv.into() }
    }
}

/// An ACL entry scoped to either a user or a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub actions: Vec<AccessAction>,
}

impl AccessPolicy {
    pub fn for_user(user: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            user: Some(user.into()),
            role: None,
            actions: actions.iter().map(|a| AccessAction::new(*a)).collect(),
        }
    }

    pub fn for_role(role: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            user: None,
            role: Some(role.into()),
            actions: actions.iter().map(|a| AccessAction::new(*a)).collect(),
        }
    }

    pub fn allows(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a.abrv.eq_ignore_ascii_case(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_splits_fields_and_links() {
        let resource: DynamicResource = serde_json::from_value(json!({
            "id": "42",
            "make": "Volvo",
            "doors": 5,
            "_links": {"put": {"href": "/resources/cars/42"}}
        }))
        .unwrap();
        assert_eq!(resource.id, Some(EntityId::from("42")));
        assert_eq!(resource.get("make"), Some(&json!("Volvo")));
        assert!(resource.links().contains("put"));
        assert!(!resource.fields.contains_key("_links"));
    }

    #[test]
    fn numeric_ids_round_trip_as_numbers() {
        let resource: DynamicResource =
            serde_json::from_value(json!({"id": 42, "make": "Volvo"})).unwrap();
        let id = resource.id.clone().unwrap();
        assert_eq!(id, EntityId::from(42u64));
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), None);
        assert!(!resource.fields.contains_key("id"));
        assert_eq!(serde_json::to_value(&resource).unwrap(), json!({"id": 42, "make": "Volvo"}));

        let schema: DynamicSchema =
            serde_json::from_value(json!({"id": 7, "name": "cars"})).unwrap();
        assert_eq!(schema.id, Some(EntityId::from(7i64)));
    }

    #[test]
    fn new_schema_keeps_extra_properties() {
        let input: NewDynamicSchema = serde_json::from_value(json!({
            "name": "archive",
            "schema": {},
            "readOnly": true
        }))
        .unwrap();
        assert_eq!(input.extra.get("readOnly"), Some(&json!(true)));
        let body = serde_json::to_value(&input).unwrap();
        assert_eq!(body["readOnly"], true);
        assert_eq!(body["name"], "archive");
    }

    #[test]
    fn resource_accepts_plain_links_key() {
        let resource: DynamicResource = serde_json::from_value(json!({
            "id": "1",
            "links": {"delete": {"href": "/resources/cars/1"}}
        }))
        .unwrap();
        assert!(resource.links().contains("delete"));
    }

    #[test]
    fn links_are_not_serialized() {
        let mut resource: DynamicResource = serde_json::from_value(json!({
            "id": "42",
            "_links": {"put": {"href": "/resources/cars/42"}}
        }))
        .unwrap();
        resource.set("color", "red");
        let body = serde_json::to_value(&resource).unwrap();
        assert_eq!(body, json!({"id": "42", "color": "red"}));
    }

    #[test]
    fn schema_uses_camel_case() {
        let schema: DynamicSchema = serde_json::from_value(json!({
            "id": "s1",
            "name": "cars",
            "schema": {"type": "object"},
            "enforceSchemaValidation": true,
            "owner": "fleet"
        }))
        .unwrap();
        assert!(schema.enforce_schema_validation);
        assert_eq!(schema.extra.get("owner"), Some(&json!("fleet")));
        let body = serde_json::to_value(&schema).unwrap();
        assert_eq!(body["enforceSchemaValidation"], true);
        assert!(body.get("description").is_none());
    }

    #[test]
    fn collection_defaults() {
        let page: ResourceCollection<DynamicResource> =
            serde_json::from_value(json!({"item": [], "page": 1, "rpp": 10, "recordCount": 0}))
                .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.rpp, 10);
    }

    #[test]
    fn policy_scoping() {
        let policy = AccessPolicy::for_role("Administrators", &["Read", "Update"]);
        assert!(policy.allows("read"));
        assert!(!policy.allows("Delete"));
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({"role": "Administrators", "actions": [{"abrv": "Read"}, {"abrv": "Update"}]})
        );
    }
}
