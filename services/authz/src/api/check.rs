//! Permission check handler.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::request_context;
use crate::api::types::{CheckRequestBody, CheckResponse};
use crate::app::AppState;
use crate::resource::CheckOutcome;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

#[utoipa::path(
    post,
    path = "/v1/check",
    tag = "check",
    request_body = CheckRequestBody,
    responses(
        (status = 200, description = "`status` for a single check, `results` for a list", body = CheckResponse),
        (status = 400, description = "Malformed request or too many checks", body = crate::api::types::ErrorResponse),
        (status = 401, description = "No current user", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Permission could not be determined", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn check_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckRequestBody>,
) -> Result<Json<CheckResponse>, ApiError> {
    let ctx = request_context(&state, &headers);
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();
    let request = body
        .into_request()
        .map_err(|message| api_validation_error(&message))?;
    let response = match state.authz.check_resource_permission(&ctx, request).await? {
        CheckOutcome::Single(allowed) => CheckResponse {
            status: Some(allowed),
            results: None,
        },
        CheckOutcome::Bulk(results) => CheckResponse {
            status: None,
            results: Some(results),
        },
    };
    Ok(Json(response))
}
