//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::observability;
use crate::resource::ResourceAuthz;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub authz: ResourceAuthz,
    /// Header carrying the authenticated principal, set by the upstream proxy.
    pub identity_header: String,
    /// User IDs allowed to revoke relations across a whole resource type.
    pub admin_subjects: Arc<[String]>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route(
            "/v1/relations",
            axum::routing::get(api::relations::list_relations)
                .post(api::relations::create_relation)
                .delete(api::relations::delete_relation),
        )
        .route(
            "/v1/relations/:id",
            axum::routing::get(api::relations::get_relation),
        )
        .route(
            "/v1/check",
            axum::routing::post(api::check::check_permission),
        )
        .route(
            "/v1/resources",
            axum::routing::get(api::resources::list_resources).post(api::resources::bind_resource),
        )
        .route(
            "/v1/resources/global",
            axum::routing::get(api::resources::list_resources_global),
        )
        .route(
            "/v1/subject-relations",
            axum::routing::delete(api::resources::delete_subject_relations),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
