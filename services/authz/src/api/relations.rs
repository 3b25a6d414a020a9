//! Relation API handlers.
//!
//! # Purpose
//! Create, read, list and revoke relation tuples. Writes require `edit` on the
//! object; the caller is resolved from the identity header.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::{RelationListResponse, RelationTuple};
use crate::api::{ensure_allowed, request_context};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use keyward_authz::{Action, Relation, Resource};

#[utoipa::path(
    post,
    path = "/v1/relations",
    tag = "relations",
    request_body = RelationTuple,
    responses(
        (status = 201, description = "Relation created", body = Relation),
        (status = 400, description = "Invalid relation", body = crate::api::types::ErrorResponse),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Caller may not edit the object", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Relation already exists", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RelationTuple>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let object = Resource::reference(body.object_namespace.clone(), body.object_id.clone());
    let relation = body
        .into_relation()
        .map_err(|err| api_validation_error(&err.to_string()))?;
    ensure_allowed(&state, &ctx, &object, &Action::edit()).await?;
    let created = state.authz.relations().create(&ctx, relation).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/relations",
    tag = "relations",
    responses(
        (status = 200, description = "List relations", body = RelationListResponse)
    )
)]
pub(crate) async fn list_relations(
    State(state): State<AppState>,
) -> Result<Json<RelationListResponse>, ApiError> {
    let items = state.authz.relations().list().await?;
    Ok(Json(RelationListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/relations/{id}",
    tag = "relations",
    params(("id" = String, Path, description = "Relation ID")),
    responses(
        (status = 200, description = "Relation", body = Relation),
        (status = 400, description = "Malformed ID", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Relation not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_relation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Relation>, ApiError> {
    Ok(Json(state.authz.relations().get(&id).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/relations",
    tag = "relations",
    params(RelationTuple),
    responses(
        (status = 204, description = "Relation deleted"),
        (status = 403, description = "Caller may not edit the object", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Relation not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RelationTuple>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let object = Resource::reference(query.object_namespace.clone(), query.object_id.clone());
    let relation = query
        .into_relation()
        .map_err(|err| api_validation_error(&err.to_string()))?;
    ensure_allowed(&state, &ctx, &object, &Action::edit()).await?;
    state.authz.relations().delete(&ctx, &relation).await?;
    Ok(StatusCode::NO_CONTENT)
}
