//! Resource handlers: binding new resources, listing what the caller can
//! access, and revoking everything held over a resource.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::{
    GlobalResourceListQuery, GlobalResourceListResponse, ResourceBindingResponse,
    ResourceCreateRequest, ResourceListQuery, ResourceListResponse, SubjectRelationsQuery,
    split_list,
};
use crate::api::{ensure_admin, ensure_allowed, request_context};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use keyward_authz::{Action, Resource};

#[utoipa::path(
    post,
    path = "/v1/resources",
    tag = "resources",
    request_body = ResourceCreateRequest,
    responses(
        (status = 201, description = "Resource bound; the caller owns it", body = ResourceBindingResponse),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Caller may not edit the parent project or organization", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Resource already has an owner", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn bind_resource(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ResourceCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    if body.id.trim().is_empty() || body.namespace.trim().is_empty() {
        return Err(api_validation_error("resource id and namespace are required"));
    }
    let user = state.authz.relations().current_user(&ctx).await?;
    let resource = Resource::new(
        body.id,
        body.namespace,
        body.name,
        body.organization_id,
        body.project_id,
        user.id,
    );
    let relations = state.authz.bind_resource(&ctx, &resource).await?;
    Ok((
        StatusCode::CREATED,
        Json(ResourceBindingResponse {
            resource,
            relations,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/resources",
    tag = "resources",
    params(ResourceListQuery),
    responses(
        (status = 200, description = "Resource ID to permissions held", body = ResourceListResponse),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_resources(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ResourceListQuery>,
) -> Result<Json<ResourceListResponse>, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let permissions = split_list(&query.permissions);
    if permissions.is_empty() {
        return Err(api_validation_error("at least one permission is required"));
    }
    let resources = state
        .authz
        .list_resource_of_user(&ctx, &query.namespace, &permissions)
        .await?;
    Ok(Json(ResourceListResponse { resources }))
}

#[utoipa::path(
    get,
    path = "/v1/resources/global",
    tag = "resources",
    params(GlobalResourceListQuery),
    responses(
        (status = 200, description = "Namespace to resource ID to permissions held", body = GlobalResourceListResponse),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_resources_global(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GlobalResourceListQuery>,
) -> Result<Json<GlobalResourceListResponse>, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let namespaces = split_list(&query.namespaces);
    let permissions = split_list(&query.permissions);
    if namespaces.is_empty() || permissions.is_empty() {
        return Err(api_validation_error(
            "at least one namespace and one permission are required",
        ));
    }
    let namespaces = state
        .authz
        .list_resource_of_user_global(&ctx, &namespaces, &permissions)
        .await?;
    Ok(Json(GlobalResourceListResponse { namespaces }))
}

#[utoipa::path(
    delete,
    path = "/v1/subject-relations",
    tag = "resources",
    params(SubjectRelationsQuery),
    responses(
        (status = 204, description = "Relations revoked"),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Caller may not delete the resource, or is not an administrator for a type-wide revoke", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_subject_relations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SubjectRelationsQuery>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let resource_id = query
        .resource_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    match resource_id {
        Some(resource_id) => {
            let resource = Resource::reference(query.resource_type.clone(), resource_id);
            ensure_allowed(&state, &ctx, &resource, &Action::delete()).await?;
        }
        None => ensure_admin(&state, &ctx).await?,
    }
    state
        .authz
        .relations()
        .delete_subject_relations(&ctx, &query.resource_type, resource_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
