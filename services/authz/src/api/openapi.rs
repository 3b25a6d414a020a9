//! OpenAPI document for the authorization API.
use crate::api::types::{
    CheckItem, CheckRequestBody, CheckResponse, ErrorResponse, GlobalResourceListResponse,
    HealthStatus, RelationListResponse, RelationTuple, ResourceBindingResponse,
    ResourceCreateRequest, ResourceListResponse,
};
use crate::api::{check, relations, resources, system};
use keyward_authz::{Object, Permission, Relation, Resource, Subject};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "keyward-authz",
        version = "v1",
        description = "Relationship-based authorization API"
    ),
    paths(
        system::system_health,
        relations::create_relation,
        relations::list_relations,
        relations::get_relation,
        relations::delete_relation,
        check::check_permission,
        resources::bind_resource,
        resources::list_resources,
        resources::list_resources_global,
        resources::delete_subject_relations
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        RelationTuple,
        RelationListResponse,
        CheckItem,
        CheckRequestBody,
        CheckResponse,
        ResourceCreateRequest,
        ResourceBindingResponse,
        ResourceListResponse,
        GlobalResourceListResponse,
        Relation,
        Object,
        Subject,
        Resource,
        Permission
    )),
    tags(
        (name = "system", description = "Health"),
        (name = "relations", description = "Relation tuples"),
        (name = "check", description = "Permission checks"),
        (name = "resources", description = "Resource binding and listing")
    )
)]
pub struct ApiDoc;
