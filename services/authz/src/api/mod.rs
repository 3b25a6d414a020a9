//! HTTP API module.
//!
//! # Purpose
//! Route handler modules plus the helpers every handler shares: building the
//! [`RequestContext`] from the identity header and gating writes on a
//! permission check.
pub mod check;
pub mod error;
pub mod openapi;
pub mod relations;
pub mod resources;
pub mod system;
pub mod types;

use crate::api::error::{ApiError, api_forbidden};
use crate::app::AppState;
use crate::context::RequestContext;
use axum::http::HeaderMap;
use keyward_authz::{Action, Resource};

/// Build the request context from the identity header set by the upstream proxy.
///
/// A missing or non-UTF-8 header yields an anonymous context; handlers that
/// need a user then fail with 401.
pub(crate) fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    headers
        .get(state.identity_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(RequestContext::with_subject)
        .unwrap_or_default()
}

/// Operator-only paths: the current user must be a configured admin subject.
pub(crate) async fn ensure_admin(state: &AppState, ctx: &RequestContext) -> Result<(), ApiError> {
    let user = state.authz.relations().current_user(ctx).await?;
    if state.admin_subjects.iter().any(|admin| *admin == user.id) {
        Ok(())
    } else {
        Err(api_forbidden("operation requires an administrator"))
    }
}

pub(crate) async fn ensure_allowed(
    state: &AppState,
    ctx: &RequestContext,
    resource: &Resource,
    action: &Action,
) -> Result<(), ApiError> {
    if state.authz.check_authz(ctx, resource, action).await? {
        Ok(())
    } else {
        Err(api_forbidden(&format!(
            "missing {action} permission on {}:{}",
            resource.namespace_id, resource.id
        )))
    }
}
