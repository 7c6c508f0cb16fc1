//! Route templates for the dynamic resource and dynamic schema endpoints.
//!
//! Routes are parsed once when a client is constructed and are immutable
//! afterwards. Mutations of existing entities (update, patch, remove) have
//! no route here: their target comes from the entity's HAL links.

use crate::uri_template::UriTemplate;

/// Parse a route template shipped with this crate.
///
/// The templates below are constants covered by `built_in_routes_parse`, so
/// a failure here is a programming error rather than a runtime condition.
fn route(template: &'static str) -> UriTemplate {
    UriTemplate::parse(template)
        .unwrap_or_else(|err| panic!("built-in route `{template}` is invalid: {err}"))
}

/// ACL routes nested under a single entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRoutes {
    pub get: UriTemplate,
    pub update: UriTemplate,
    pub delete_by_user: UriTemplate,
    pub delete_by_role: UriTemplate,
}

/// Routes for dynamic resource instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoutes {
    pub find: UriTemplate,
    pub get: UriTemplate,
    pub create: UriTemplate,
    pub permissions: PermissionRoutes,
}

impl ResourceRoutes {
    pub fn new() -> Self {
        Self {
            find: route("resources/{schemaName}/{?searchQuery,page,rpp,sort,embed,fields}"),
            get: route("resources/{schemaName}/{id}/{?embed,fields}"),
            create: route("resources/{schemaName}"),
            permissions: PermissionRoutes {
                get: route("resources/{schemaName}/{id}/permissions/{?fields}"),
                update: route("resources/{schemaName}/{id}/permissions/{?fields}"),
                delete_by_user: route(
                    "resources/{schemaName}/{id}/permissions/actions/{accessAction}/users/{user}/",
                ),
                delete_by_role: route(
                    "resources/{schemaName}/{id}/permissions/actions/{accessAction}/roles/{role}/",
                ),
            },
        }
    }
}

impl Default for ResourceRoutes {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes for dynamic resource schemas. Schema ACL lives under `/acl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRoutes {
    pub find: UriTemplate,
    pub get: UriTemplate,
    pub create: UriTemplate,
    pub generate: UriTemplate,
    pub permissions: PermissionRoutes,
}

impl SchemaRoutes {
    pub fn new() -> Self {
        Self {
            find: route("schemas/{?searchQuery,page,rpp,sort,embed,fields}"),
            get: route("schemas/{name}/{?embed,fields}"),
            create: route("schemas"),
            generate: route("schemas/generate"),
            permissions: PermissionRoutes {
                get: route("schemas/{name}/acl/{?fields}"),
                update: route("schemas/{name}/acl/{?fields}"),
                delete_by_user: route("schemas/{name}/acl/actions/{accessAction}/users/{user}/"),
                delete_by_role: route("schemas/{name}/acl/actions/{accessAction}/roles/{role}/"),
            },
        }
    }
}

impl Default for SchemaRoutes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri_template::TemplateParams;

    #[test]
    fn built_in_routes_parse() {
        let resources = ResourceRoutes::new();
        let schemas = SchemaRoutes::new();
        assert_eq!(resources.find.variables()[0], "schemaName");
        assert_eq!(schemas.get.variables(), vec!["name", "embed", "fields"]);
    }

    #[test]
    fn delete_by_user_route() {
        let params = TemplateParams::new()
            .with("schemaName", "cars")
            .with("id", "42")
            .with("accessAction", "Read")
            .with("user", "jdoe");
        assert_eq!(
            ResourceRoutes::new()
                .permissions
                .delete_by_user
                .try_expand(&params)
                .unwrap(),
            "resources/cars/42/permissions/actions/Read/users/jdoe/"
        );
    }

    #[test]
    fn schema_acl_route() {
        let params = TemplateParams::new().with("name", "cars").with("fields", "user");
        assert_eq!(
            SchemaRoutes::new().permissions.get.try_expand(&params).unwrap(),
            "schemas/cars/acl/?fields=user"
        );
    }

    #[test]
    fn create_routes_have_no_query() {
        let params = TemplateParams::new().with("schemaName", "cars");
        assert_eq!(ResourceRoutes::new().create.try_expand(&params).unwrap(), "resources/cars");
        assert_eq!(
            SchemaRoutes::new().generate.try_expand(&TemplateParams::new()).unwrap(),
            "schemas/generate"
        );
    }
}
