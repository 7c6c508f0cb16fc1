//! Paging, sorting and projection options for `find` and `get` calls.
//!
//! Options are caller-facing names (`page_number`, `order_by`, ...) that
//! map onto the backend's query parameters when turned into
//! `TemplateParams`:
//!
//! | option                         | query parameter |
//! |--------------------------------|-----------------|
//! | `page_number`                  | `page`          |
//! | `page_size`                    | `rpp`           |
//! | `search`                       | `searchQuery`   |
//! | `order_by` + `order_direction` | `sort` (`name\|desc`) |
//! | `embed`, `fields`              | comma lists     |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::uri_template::TemplateParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

/// Options for `find` operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOptions {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub search: Option<String>,
    pub embed: Vec<String>,
    pub fields: Vec<String>,
    /// Additional parameters passed straight to the template, for routes
    /// that accept more than the standard set.
    #[serde(skip)]
    pub extra: TemplateParams,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, number: u32, size: u32) -> Self {
        self.page_number = Some(number);
        self.page_size = Some(size);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(field.into());
        self.order_direction = Some(direction);
        self
    }

    pub fn search(mut self, phrase: impl Into<String>) -> Self {
        self.search = Some(phrase.into());
        self
    }

    pub fn embed(mut self, relation: impl Into<String>) -> Self {
        self.embed.push(relation.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name, value);
        self
    }

    /// The sort expression understood by the backend.
    pub fn sort(&self) -> Option<String> {
        let field = self.order_by.as_deref().filter(|f| !f.is_empty())?;
        Some(match self.order_direction {
            Some(direction) => format!("{field}|{}", direction.as_str()),
            None => field.to_string(),
        })
    }

    pub fn to_params(&self) -> TemplateParams {
        let mut params = self.extra.clone();
        if let Some(search) = &self.search {
            params.insert("searchQuery", search.as_str());
        }
        if let Some(page) = self.page_number {
            params.insert("page", page);
        }
        if let Some(rpp) = self.page_size {
            params.insert("rpp", rpp);
        }
        if let Some(sort) = self.sort() {
            params.insert("sort", sort);
        }
        insert_list(&mut params, "embed", &self.embed);
        insert_list(&mut params, "fields", &self.fields);
        params
    }
}

/// Options for `get` operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetOptions {
    pub embed: Vec<String>,
    pub fields: Vec<String>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed(mut self, relation: impl Into<String>) -> Self {
        self.embed.push(relation.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn to_params(&self) -> TemplateParams {
        let mut params = TemplateParams::new();
        insert_list(&mut params, "embed", &self.embed);
        insert_list(&mut params, "fields", &self.fields);
        params
    }
}

fn insert_list(params: &mut TemplateParams, name: &str, values: &[String]) {
    if !values.is_empty() {
        params.insert(name, values.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_options_map_to_backend_names() {
        let params = FindOptions::new()
            .page(2, 25)
            .order_by("dateCreated", OrderDirection::Desc)
            .search("volvo")
            .embed("owner")
            .to_params();
        assert_eq!(params.get("page"), Some(&json!(2)));
        assert_eq!(params.get("rpp"), Some(&json!(25)));
        assert_eq!(params.get("sort"), Some(&json!("dateCreated|desc")));
        assert_eq!(params.get("searchQuery"), Some(&json!("volvo")));
        assert_eq!(params.get("embed"), Some(&json!(["owner"])));
        assert!(params.get("fields").is_none());
    }

    #[test]
    fn sort_without_direction() {
        let options = FindOptions {
            order_by: Some("name".into()),
            ..FindOptions::default()
        };
        assert_eq!(options.sort().as_deref(), Some("name"));
        assert_eq!(FindOptions::new().sort(), None);
    }

    #[test]
    fn empty_options_produce_no_params() {
        assert!(FindOptions::new().to_params().is_empty());
        assert!(GetOptions::new().to_params().is_empty());
    }

    #[test]
    fn extra_params_are_kept() {
        let params = FindOptions::new().param("statuses", "active").to_params();
        assert_eq!(params.get("statuses"), Some(&json!("active")));
    }

    #[test]
    fn deserializes_from_camel_case() {
        let options: FindOptions = serde_json::from_value(json!({
            "pageNumber": 1,
            "pageSize": 10,
            "orderBy": "name",
            "orderDirection": "asc",
            "search": "x"
        }))
        .unwrap();
        assert_eq!(options.sort().as_deref(), Some("name|asc"));
        assert_eq!(options.page_size, Some(10));
    }
}
