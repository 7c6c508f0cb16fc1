//! In-memory backend for the dynamic resource and dynamic schema APIs.
//!
//! Every entity is returned with HAL `_links`. Resources stored under a
//! schema created with `"readOnly": true` only advertise `self`, and the
//! server refuses mutations on them, which is how clients observe
//! server-side access control.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, MethodRouter},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub enforce_schema_validation: bool,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub enforce_schema_validation: bool,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAction {
    pub abrv: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub actions: Vec<AccessAction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindParams {
    pub search_query: Option<String>,
    pub page: Option<usize>,
    pub rpp: Option<usize>,
    pub sort: Option<String>,
}

#[derive(Debug, Default)]
pub struct Store {
    schemas: BTreeMap<String, Schema>,
    resources: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    schema_acl: HashMap<String, Vec<AccessPolicy>>,
    resource_acl: HashMap<(String, String), Vec<AccessPolicy>>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::default();
    let routes: Vec<(&str, MethodRouter<Db>)> = vec![
        ("/schemas", get(list_schemas).post(create_schema)),
        ("/schemas/generate", post(generate_schema)),
        (
            "/schemas/{name}",
            get(get_schema)
                .put(update_schema)
                .patch(patch_schema)
                .delete(delete_schema),
        ),
        ("/schemas/{name}/acl", get(get_schema_acl).put(put_schema_acl)),
        (
            "/schemas/{name}/acl/actions/{action}/users/{user}",
            delete(delete_schema_acl_by_user),
        ),
        (
            "/schemas/{name}/acl/actions/{action}/roles/{role}",
            delete(delete_schema_acl_by_role),
        ),
        ("/resources/{schema}", get(list_resources).post(create_resource)),
        (
            "/resources/{schema}/{id}",
            get(get_resource)
                .put(update_resource)
                .patch(patch_resource)
                .delete(delete_resource),
        ),
        (
            "/resources/{schema}/{id}/permissions",
            get(get_resource_acl).put(put_resource_acl),
        ),
        (
            "/resources/{schema}/{id}/permissions/actions/{action}/users/{user}",
            delete(delete_resource_acl_by_user),
        ),
        (
            "/resources/{schema}/{id}/permissions/actions/{action}/roles/{role}",
            delete(delete_resource_acl_by_role),
        ),
    ];

    // templates end collection and item routes with '/', so serve both forms
    routes
        .into_iter()
        .fold(Router::new(), |router, (path, handler)| {
            router
                .route(path, handler.clone())
                .route(&format!("{path}/"), handler)
        })
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- representations ---

fn link(href: &str) -> Value {
    json!({ "href": href })
}

fn schema_json(schema: &Schema) -> Value {
    let href = format!("/schemas/{}", schema.name);
    let mut body = match serde_json::to_value(schema) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    body.insert(
        "_links".to_string(),
        json!({
            "self": link(&href),
            "put": link(&href),
            "patch": link(&href),
            "delete": link(&href),
        }),
    );
    Value::Object(body)
}

fn resource_json(schema: &Schema, id: &str, fields: &Map<String, Value>) -> Value {
    let href = format!("/resources/{}/{}", schema.name, id);
    let mut links = Map::new();
    links.insert("self".to_string(), link(&href));
    if !schema.read_only {
        for rel in ["put", "patch", "delete"] {
            links.insert(rel.to_string(), link(&href));
        }
    }
    let mut body = fields.clone();
    body.insert("id".to_string(), Value::String(id.to_string()));
    body.insert("_links".to_string(), Value::Object(links));
    Value::Object(body)
}

fn collection_json(items: Vec<Value>, params: &FindParams, href: &str) -> Value {
    let page = params.page.unwrap_or(1).max(1);
    let rpp = params.rpp.unwrap_or(10).max(1);
    let record_count = items.len();
    let offset = page.saturating_sub(1).saturating_mul(rpp);
    let item: Vec<Value> = items.into_iter().skip(offset).take(rpp).collect();
    let mut body = json!({
        "item": item,
        "page": page,
        "rpp": rpp,
        "recordCount": record_count,
        "_links": { "self": link(href) },
    });
    if let Some(query) = &params.search_query {
        body["searchQuery"] = Value::String(query.clone());
    }
    if let Some(sort) = &params.sort {
        body["sort"] = Value::String(sort.clone());
    }
    body
}

/// Apply `searchQuery` and `sort` (`field|asc` or `field|desc`).
fn filter_and_sort(mut items: Vec<Value>, params: &FindParams) -> Vec<Value> {
    if let Some(query) = params.search_query.as_deref().filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        items.retain(|item| item.to_string().to_lowercase().contains(&needle));
    }
    if let Some(sort) = params.sort.as_deref() {
        let (field, direction) = sort.split_once('|').unwrap_or((sort, "asc"));
        items.sort_by(|a, b| compare_values(a.get(field), b.get(field)));
        if direction.eq_ignore_ascii_case("desc") {
            items.reverse();
        }
    }
    items
}

/// Numbers compare numerically, strings lexically; missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (a, b) => a.map(Value::to_string).cmp(&b.map(Value::to_string)),
    }
}

fn entity_fields(mut body: Map<String, Value>) -> Map<String, Value> {
    body.remove("id");
    body.remove("_links");
    body.remove("links");
    body
}

fn missing_required(schema: &Schema, fields: &Map<String, Value>) -> bool {
    if !schema.enforce_schema_validation {
        return false;
    }
    schema
        .schema
        .get("required")
        .and_then(Value::as_array)
        .map(|required| {
            required
                .iter()
                .filter_map(Value::as_str)
                .any(|name| !fields.contains_key(name))
        })
        .unwrap_or(false)
}

fn infer_type(sample: &Value) -> Value {
    match sample {
        Value::Object(map) => {
            let properties: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), infer_type(value)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
        Value::Array(items) => json!({
            "type": "array",
            "items": items.first().map(infer_type).unwrap_or_else(|| json!({})),
        }),
        Value::String(_) => json!({ "type": "string" }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "type": "integer" }),
        Value::Number(_) => json!({ "type": "number" }),
        Value::Bool(_) => json!({ "type": "boolean" }),
        Value::Null => json!({ "type": "null" }),
    }
}

fn remove_action(policies: &mut Vec<AccessPolicy>, action: &str, user: Option<&str>, role: Option<&str>) {
    for policy in policies.iter_mut() {
        let matches = match (user, role) {
            (Some(user), _) => policy.user.as_deref() == Some(user),
            (_, Some(role)) => policy.role.as_deref() == Some(role),
            _ => false,
        };
        if matches {
            policy.actions.retain(|a| !a.abrv.eq_ignore_ascii_case(action));
        }
    }
    policies.retain(|policy| !policy.actions.is_empty());
}

// --- schemas ---

async fn list_schemas(State(db): State<Db>, Query(params): Query<FindParams>) -> Json<Value> {
    let store = db.read().await;
    let items = store.schemas.values().map(schema_json).collect();
    Json(collection_json(filter_and_sort(items, &params), &params, "/schemas"))
}

async fn create_schema(
    State(db): State<Db>,
    Json(input): Json<CreateSchema>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if input.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut store = db.write().await;
    if store.schemas.contains_key(&input.name) {
        return Err(StatusCode::CONFLICT);
    }
    let schema = Schema {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        description: input.description,
        schema: input.schema,
        enforce_schema_validation: input.enforce_schema_validation,
        read_only: input.read_only,
    };
    tracing::debug!(name = %schema.name, "schema created");
    let body = schema_json(&schema);
    store.schemas.insert(schema.name.clone(), schema);
    Ok((StatusCode::CREATED, Json(body)))
}

async fn get_schema(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store
        .schemas
        .get(&name)
        .map(|schema| Json(schema_json(schema)))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_schema(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let schema = store.schemas.get_mut(&name).ok_or(StatusCode::NOT_FOUND)?;
    schema.description = input
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    schema.schema = input.get("schema").cloned().unwrap_or(Value::Null);
    schema.enforce_schema_validation = input
        .get("enforceSchemaValidation")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(Json(schema_json(schema)))
}

async fn patch_schema(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let schema = store.schemas.get_mut(&name).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(description) = input.get("description").and_then(Value::as_str) {
        schema.description = Some(description.to_string());
    }
    if let Some(definition) = input.get("schema") {
        schema.schema = definition.clone();
    }
    if let Some(enforce) = input.get("enforceSchemaValidation").and_then(Value::as_bool) {
        schema.enforce_schema_validation = enforce;
    }
    Ok(Json(schema_json(schema)))
}

async fn delete_schema(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store.schemas.remove(&name).ok_or(StatusCode::NOT_FOUND)?;
    store.resources.remove(&name);
    store.schema_acl.remove(&name);
    store.resource_acl.retain(|(schema, _), _| schema != &name);
    tracing::debug!(%name, "schema deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn generate_schema(Json(sample): Json<Value>) -> Json<Value> {
    let mut generated = infer_type(&sample);
    if let Some(properties) = generated.get_mut("properties").and_then(Value::as_object_mut) {
        properties.insert(
            "id".to_string(),
            json!({
                "title": "Unique Identifier",
                "readonly": true,
                "hidden": true,
                "type": "string",
            }),
        );
    }
    Json(generated)
}

async fn get_schema_acl(
    State(db): State<Db>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AccessPolicy>>, StatusCode> {
    let store = db.read().await;
    if !store.schemas.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(store.schema_acl.get(&name).cloned().unwrap_or_default()))
}

async fn put_schema_acl(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(policies): Json<Vec<AccessPolicy>>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !store.schemas.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.schema_acl.insert(name, policies);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_schema_acl_by_user(
    State(db): State<Db>,
    Path((name, action, user)): Path<(String, String, String)>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !store.schemas.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    if let Some(policies) = store.schema_acl.get_mut(&name) {
        remove_action(policies, &action, Some(user.as_str()), None);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_schema_acl_by_role(
    State(db): State<Db>,
    Path((name, action, role)): Path<(String, String, String)>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !store.schemas.contains_key(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    if let Some(policies) = store.schema_acl.get_mut(&name) {
        remove_action(policies, &action, None, Some(role.as_str()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- resources ---

async fn list_resources(
    State(db): State<Db>,
    Path(schema_name): Path<String>,
    Query(params): Query<FindParams>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let schema = store.schemas.get(&schema_name).ok_or(StatusCode::NOT_FOUND)?;
    let items = store
        .resources
        .get(&schema_name)
        .map(|resources| {
            resources
                .iter()
                .map(|(id, fields)| resource_json(schema, id, fields))
                .collect()
        })
        .unwrap_or_default();
    let href = format!("/resources/{schema_name}");
    Ok(Json(collection_json(filter_and_sort(items, &params), &params, &href)))
}

async fn create_resource(
    State(db): State<Db>,
    Path(schema_name): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut store = db.write().await;
    let schema = store
        .schemas
        .get(&schema_name)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    let id = input
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let fields = entity_fields(input);
    if missing_required(&schema, &fields) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let resources = store.resources.entry(schema_name).or_default();
    if resources.contains_key(&id) {
        return Err(StatusCode::CONFLICT);
    }
    let body = resource_json(&schema, &id, &fields);
    resources.insert(id, fields);
    Ok((StatusCode::CREATED, Json(body)))
}

async fn get_resource(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    let schema = store.schemas.get(&schema_name).ok_or(StatusCode::NOT_FOUND)?;
    store
        .resources
        .get(&schema_name)
        .and_then(|resources| resources.get(&id))
        .map(|fields| Json(resource_json(schema, &id, fields)))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_resource(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    mutate_resource(&db, &schema_name, &id, |fields| *fields = entity_fields(input)).await
}

async fn patch_resource(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, StatusCode> {
    mutate_resource(&db, &schema_name, &id, |fields| fields.extend(entity_fields(input))).await
}

async fn mutate_resource(
    db: &Db,
    schema_name: &str,
    id: &str,
    apply: impl FnOnce(&mut Map<String, Value>),
) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let schema = store
        .schemas
        .get(schema_name)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    let fields = store
        .resources
        .get_mut(schema_name)
        .and_then(|resources| resources.get_mut(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    if schema.read_only {
        return Err(StatusCode::FORBIDDEN);
    }
    apply(fields);
    Ok(Json(resource_json(&schema, id, fields)))
}

async fn delete_resource(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    let read_only = store
        .schemas
        .get(&schema_name)
        .map(|schema| schema.read_only)
        .ok_or(StatusCode::NOT_FOUND)?;
    let resources = store.resources.get_mut(&schema_name).ok_or(StatusCode::NOT_FOUND)?;
    if !resources.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    if read_only {
        return Err(StatusCode::FORBIDDEN);
    }
    resources.remove(&id);
    store.resource_acl.remove(&(schema_name, id));
    Ok(StatusCode::NO_CONTENT)
}

fn resource_exists(store: &Store, schema_name: &str, id: &str) -> bool {
    store
        .resources
        .get(schema_name)
        .is_some_and(|resources| resources.contains_key(id))
}

async fn get_resource_acl(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
) -> Result<Json<Vec<AccessPolicy>>, StatusCode> {
    let store = db.read().await;
    if !resource_exists(&store, &schema_name, &id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(
        store
            .resource_acl
            .get(&(schema_name, id))
            .cloned()
            .unwrap_or_default(),
    ))
}

async fn put_resource_acl(
    State(db): State<Db>,
    Path((schema_name, id)): Path<(String, String)>,
    Json(policies): Json<Vec<AccessPolicy>>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !resource_exists(&store, &schema_name, &id) {
        return Err(StatusCode::NOT_FOUND);
    }
    store.resource_acl.insert((schema_name, id), policies);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_resource_acl_by_user(
    State(db): State<Db>,
    Path((schema_name, id, action, user)): Path<(String, String, String, String)>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !resource_exists(&store, &schema_name, &id) {
        return Err(StatusCode::NOT_FOUND);
    }
    if let Some(policies) = store.resource_acl.get_mut(&(schema_name, id)) {
        remove_action(policies, &action, Some(user.as_str()), None);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_resource_acl_by_role(
    State(db): State<Db>,
    Path((schema_name, id, action, role)): Path<(String, String, String, String)>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    if !resource_exists(&store, &schema_name, &id) {
        return Err(StatusCode::NOT_FOUND);
    }
    if let Some(policies) = store.resource_acl.get_mut(&(schema_name, id)) {
        remove_action(policies, &action, None, Some(role.as_str()));
    }
    Ok(StatusCode::NO_CONTENT)
}
