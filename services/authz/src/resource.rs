//! Resource authorization facade.
//!
//! # Purpose
//! Resource-shaped entry points used by API handlers: single and bulk checks
//! for the request's current user, resource listings, and the anchoring
//! relations created for a new resource.
//!
//! # How it fits
//! Translates [`Resource`]s into the `(namespace, object id)` pairs the
//! [`RelationService`] works with and owns the concurrent bulk-check fan-out.
//!
//! # Key invariants
//! - Bulk checks accept between 1 and `check_api_limit` pairs; anything else is
//!   rejected before the backend is called.
//! - Bulk checks fail fast: the first error cancels outstanding checks and is
//!   returned alone. No partial result list is ever returned.
//! - Bulk results arrive in completion order; correlate them by
//!   [`Permission::key`].
//! - A check task that dies without answering fails the whole batch.
//! - Binding a resource requires `edit` on its project (or organization when
//!   it has no project) and is refused once the resource has an owner.
//!
//! # Examples
//! ```no_run
//! # async fn demo(authz: authz::resource::ResourceAuthz) -> authz::relation::RelationResult<()> {
//! use authz::context::RequestContext;
//! use keyward_authz::{Action, Resource};
//!
//! let ctx = RequestContext::with_subject("user:u1");
//! let allowed = authz
//!     .check_authz(&ctx, &Resource::reference("project", "proj-42"), &Action::edit())
//!     .await?;
//! # let _ = allowed;
//! # Ok(())
//! # }
//! ```
use keyward_authz::namespace::{NS_ORGANIZATION, NS_PROJECT, NS_USER};
use keyward_authz::{
    Action, Object, Permission, RESOURCE_ORGANIZATION_ROLE, RESOURCE_PROJECT_ROLE, Relation,
    Resource, RoleKind, Subject, role_id,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::context::{RequestContext, User};
use crate::relation::{RelationError, RelationResult, RelationService};

/// One `(resource, action)` pair of a bulk check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCheck {
    pub resource: Resource,
    pub action: Action,
}

impl ResourceCheck {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

/// A check request in either the legacy single shape or the list shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckRequest {
    Single(ResourceCheck),
    Bulk(Vec<ResourceCheck>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Single(bool),
    Bulk(Vec<Permission>),
}

/// Resource ID to the permissions the user holds on it.
pub type ResourcePermissions = HashMap<String, Vec<String>>;

#[derive(Clone)]
pub struct ResourceAuthz {
    relations: Arc<RelationService>,
    check_api_limit: usize,
}

impl ResourceAuthz {
    pub fn new(relations: Arc<RelationService>, check_api_limit: usize) -> Self {
        Self {
            relations,
            check_api_limit,
        }
    }

    pub fn relations(&self) -> &Arc<RelationService> {
        &self.relations
    }

    pub fn check_api_limit(&self) -> usize {
        self.check_api_limit
    }

    pub async fn check_authz(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
        action: &Action,
    ) -> RelationResult<bool> {
        let user = self.relations.current_user(ctx).await?;
        self.relations
            .check_permission(&user, &resource.namespace_id, &resource.id, action)
            .await
    }

    /// Check `resources[i]` against `actions[i]` concurrently.
    pub async fn bulk_check_authz(
        &self,
        ctx: &RequestContext,
        resources: &[Resource],
        actions: &[Action],
    ) -> RelationResult<Vec<Permission>> {
        if resources.len() != actions.len() {
            return Err(RelationError::BulkShape(format!(
                "{} resources paired with {} actions",
                resources.len(),
                actions.len()
            )));
        }
        let checks = resources
            .iter()
            .cloned()
            .zip(actions.iter().cloned())
            .map(|(resource, action)| ResourceCheck::new(resource, action))
            .collect();
        self.check_all(ctx, checks).await
    }

    /// Answer a check in whichever shape the caller sent.
    ///
    /// The single shape is evaluated inline without the fan-out.
    pub async fn check_resource_permission(
        &self,
        ctx: &RequestContext,
        request: CheckRequest,
    ) -> RelationResult<CheckOutcome> {
        match request {
            CheckRequest::Single(check) => self
                .check_authz(ctx, &check.resource, &check.action)
                .await
                .map(CheckOutcome::Single),
            CheckRequest::Bulk(checks) => self.check_all(ctx, checks).await.map(CheckOutcome::Bulk),
        }
    }

    /// Concurrent fan-out: one task per pair, two channels sized to the batch,
    /// one collector that cancels everything on the first error.
    pub async fn check_all(
        &self,
        ctx: &RequestContext,
        checks: Vec<ResourceCheck>,
    ) -> RelationResult<Vec<Permission>> {
        let total = checks.len();
        if total == 0 || total > self.check_api_limit {
            metrics::counter!("keyward_bulk_checks_total", "outcome" => "rejected").increment(1);
            return Err(RelationError::BulkLimit {
                requested: total,
                limit: self.check_api_limit,
            });
        }
        let user = self.relations.current_user(ctx).await?;

        let batch = ctx.child();
        let cancel = batch.cancellation().clone();
        let _abort_on_drop = cancel.clone().drop_guard();
        let (result_tx, mut result_rx) = mpsc::channel::<Permission>(total);
        let (error_tx, mut error_rx) = mpsc::channel::<RelationError>(total);

        let mut producers = JoinSet::new();
        for check in checks {
            let relations = self.relations.clone();
            let user = user.clone();
            let cancel = cancel.clone();
            let result_tx = result_tx.clone();
            let error_tx = error_tx.clone();
            producers.spawn(async move {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return,
                    outcome = check_one(&relations, &user, &check) => outcome,
                };
                if cancel.is_cancelled() {
                    return;
                }
                match outcome {
                    Ok(permission) => {
                        let _ = result_tx.send(permission).await;
                    }
                    Err(err) => {
                        let _ = error_tx.send(err).await;
                    }
                }
            });
        }
        drop(result_tx);
        drop(error_tx);

        let mut permissions = Vec::with_capacity(total);
        while permissions.len() < total {
            tokio::select! {
                Some(permission) = result_rx.recv() => permissions.push(permission),
                Some(err) = error_rx.recv() => {
                    cancel.cancel();
                    metrics::counter!("keyward_bulk_checks_total", "outcome" => "error").increment(1);
                    tracing::debug!(error = %err, total, "bulk check failed");
                    return Err(err);
                }
                Some(joined) = producers.join_next() => {
                    if let Err(err) = joined {
                        cancel.cancel();
                        producers.abort_all();
                        metrics::counter!("keyward_bulk_checks_total", "outcome" => "error").increment(1);
                        tracing::error!(error = %err, total, "bulk check task failed");
                        return Err(RelationError::CheckTaskFailed(err.to_string()));
                    }
                }
                _ = cancel.cancelled() => {
                    metrics::counter!("keyward_bulk_checks_total", "outcome" => "cancelled").increment(1);
                    return Err(RelationError::Cancelled);
                }
            }
        }
        metrics::counter!("keyward_bulk_checks_total", "outcome" => "ok").increment(1);
        Ok(permissions)
    }

    /// Resources of `namespace` the current user holds any of `permissions` on.
    pub async fn list_resource_of_user(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        permissions: &[String],
    ) -> RelationResult<ResourcePermissions> {
        let user = self.relations.current_user(ctx).await?;
        lookup_namespace(&self.relations, &user, namespace, permissions).await
    }

    /// [`Self::list_resource_of_user`] across several namespaces, one task per namespace.
    pub async fn list_resource_of_user_global(
        &self,
        ctx: &RequestContext,
        namespaces: &[String],
        permissions: &[String],
    ) -> RelationResult<HashMap<String, ResourcePermissions>> {
        let user = self.relations.current_user(ctx).await?;
        let permissions: Arc<[String]> = permissions.into();
        let mut lookups = JoinSet::new();
        for namespace in namespaces {
            let relations = self.relations.clone();
            let user = user.clone();
            let permissions = permissions.clone();
            let namespace = namespace.clone();
            lookups.spawn(async move {
                let found = lookup_namespace(&relations, &user, &namespace, &permissions).await;
                (namespace, found)
            });
        }

        let mut by_namespace = HashMap::with_capacity(namespaces.len());
        loop {
            let joined = tokio::select! {
                joined = lookups.join_next() => joined,
                _ = ctx.cancellation().cancelled() => {
                    lookups.abort_all();
                    return Err(RelationError::Cancelled);
                }
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((namespace, Ok(found))) => {
                    by_namespace.insert(namespace, found);
                }
                Ok((_, Err(err))) => {
                    lookups.abort_all();
                    return Err(err);
                }
                Err(err) => {
                    lookups.abort_all();
                    tracing::error!(error = %err, "resource lookup task failed");
                    return Err(RelationError::Cancelled);
                }
            }
        }
        Ok(by_namespace)
    }

    /// Create the anchoring relations of a newly created resource: its
    /// project and organization bindings and the current user as owner.
    ///
    /// The current user needs `edit` on the project the resource lives in, or
    /// on its organization when it has no project. A resource that already has
    /// an owner is refused with [`RelationError::AlreadyOwned`]. The owner
    /// binding is written last, so retrying after a partial failure reuses the
    /// bindings already present.
    pub async fn bind_resource(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
    ) -> RelationResult<Vec<Relation>> {
        let user = self.relations.current_user(ctx).await?;
        if let Some((namespace, id)) = parent_of(resource) {
            let action = Action::edit();
            if !self
                .relations
                .check_permission(&user, namespace, id, &action)
                .await?
            {
                return Err(RelationError::PermissionDenied(format!(
                    "missing {action} permission on {namespace}:{id}"
                )));
            }
        }
        let object = Object::new(resource.id.clone(), resource.namespace_id.clone());
        let held = self.relations.list_for_object(&object).await?;
        if held
            .iter()
            .any(|relation| RoleKind::from_role_id(&relation.subject.role_id) == Some(RoleKind::Owner))
        {
            return Err(RelationError::AlreadyOwned(format!(
                "{}:{}",
                object.namespace_id, object.id
            )));
        }
        let mut bindings = Vec::with_capacity(3);
        if !resource.project_id.is_empty() {
            bindings.push(Relation::new(
                object.clone(),
                Subject::new(resource.project_id.clone(), NS_PROJECT, RESOURCE_PROJECT_ROLE),
            ));
        }
        if !resource.organization_id.is_empty() {
            bindings.push(Relation::new(
                object.clone(),
                Subject::new(
                    resource.organization_id.clone(),
                    NS_ORGANIZATION,
                    RESOURCE_ORGANIZATION_ROLE,
                ),
            ));
        }
        bindings.push(Relation::new(
            object,
            Subject::new(
                user.id.clone(),
                NS_USER,
                role_id(&resource.namespace_id, RoleKind::Owner),
            ),
        ));

        let mut created = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let relation = match self.relations.create(ctx, binding.clone()).await {
                Ok(relation) => relation,
                Err(RelationError::Conflict) => {
                    self.relations.get_relation_by_fields(&binding).await?
                }
                Err(err) => return Err(err),
            };
            created.push(relation);
        }
        tracing::debug!(urn = %resource.urn, bindings = created.len(), "bound resource");
        Ok(created)
    }
}

/// The binding a new resource is created under.
fn parent_of(resource: &Resource) -> Option<(&'static str, &str)> {
    if !resource.project_id.is_empty() {
        Some((NS_PROJECT, resource.project_id.as_str()))
    } else if !resource.organization_id.is_empty() {
        Some((NS_ORGANIZATION, resource.organization_id.as_str()))
    } else {
        None
    }
}

async fn check_one(
    relations: &RelationService,
    user: &User,
    check: &ResourceCheck,
) -> RelationResult<Permission> {
    let allowed = relations
        .check_permission(
            user,
            &check.resource.namespace_id,
            &check.resource.id,
            &check.action,
        )
        .await?;
    Ok(Permission {
        object_id: check.resource.id.clone(),
        object_namespace: check.resource.namespace_id.clone(),
        permission: check.action.as_str().to_string(),
        allowed,
    })
}

async fn lookup_namespace(
    relations: &RelationService,
    user: &User,
    namespace: &str,
    permissions: &[String],
) -> RelationResult<ResourcePermissions> {
    let mut by_resource: ResourcePermissions = HashMap::new();
    for permission in permissions {
        let ids = relations
            .lookup_resources(namespace, permission, NS_USER, &user.id)
            .await?;
        for id in ids {
            by_resource.entry(id).or_default().push(permission.clone());
        }
    }
    Ok(by_resource)
}
