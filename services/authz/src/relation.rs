//! Relation service: the single authority for relation lifecycle and
//! permission evaluation.
//!
//! # Purpose
//! Applies every relation mutation to both the [`RelationStore`] and the
//! [`AuthzBackend`] and answers permission questions by delegating to the
//! backend.
//!
//! # Key invariants and assumptions
//! - Create writes the store first, then the backend. A store failure means
//!   the backend is never called.
//! - Delete removes from the backend first, then the store, so a partial
//!   failure never leaves the backend granting something the store no longer
//!   lists.
//! - A backend failure after a successful store write is reported as
//!   [`RelationError::CreatingRelationInAuthzEngine`]; the orphaned store
//!   record stays until [`RelationService::reconcile`] re-propagates it.
//! - A store failure after the backend already revoked a grant marks the
//!   record as pending delete. Reconciliation retries the store removal and
//!   never re-grants a pending record.
//! - Audit logging runs detached and never affects the returned result.
//! - Checks are never cached: every call reaches the backend.
use keyward_authz::namespace::NS_USER;
use keyward_authz::{Action, Object, Permission, Relation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::activity::{
    ACTIVITY_RELATION_CREATE, ACTIVITY_RELATION_DELETE, ACTIVITY_RELATION_SUBJECT_DELETE,
    ActivitySink, spawn_activity_log,
};
use crate::backend::{AuthzBackend, BackendError};
use crate::context::{AuthnError, CurrentUserResolver, RequestContext, User};
use crate::store::{RelationStore, StoreError};

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("relation doesn't exist")]
    NotExist,
    #[error("relation id is not a valid uuid: {0}")]
    InvalidUuid(String),
    #[error("invalid relation detail: {0}")]
    InvalidDetail(String),
    #[error("relation already exists")]
    Conflict,
    #[error("error creating relation in store")]
    CreatingRelationInStore(#[source] StoreError),
    #[error("error creating relation in authz engine")]
    CreatingRelationInAuthzEngine(#[source] BackendError),
    #[error("error deleting relation in authz engine")]
    DeletingRelationInAuthzEngine(#[source] BackendError),
    #[error("error deleting relation in store")]
    DeletingRelationInStore(#[source] StoreError),
    #[error("relation store failure")]
    Store(#[source] StoreError),
    #[error("authorization backend failure")]
    Backend(#[source] BackendError),
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthnError),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("resource {0} already has an owner")]
    AlreadyOwned(String),
    #[error("bulk check of {requested} pairs is outside 1..={limit}")]
    BulkLimit { requested: usize, limit: usize },
    #[error("malformed check request: {0}")]
    BulkShape(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("permission check task failed: {0}")]
    CheckTaskFailed(String),
}

pub type RelationResult<T> = Result<T, RelationError>;

impl RelationError {
    fn from_lookup(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotExist,
            other => Self::Store(other),
        }
    }
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub propagated: usize,
    pub failed: usize,
    /// Pending deletes whose store removal succeeded on this sweep.
    pub retired: usize,
    /// Stored records skipped because their delete is still pending.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct RelationService {
    store: Arc<dyn RelationStore>,
    backend: Arc<dyn AuthzBackend>,
    users: Arc<dyn CurrentUserResolver>,
    activity: Arc<dyn ActivitySink>,
    /// Revoked in the backend, still present in the store.
    pending_deletes: Arc<Mutex<HashSet<Uuid>>>,
}

impl RelationService {
    pub fn new(
        store: Arc<dyn RelationStore>,
        backend: Arc<dyn AuthzBackend>,
        users: Arc<dyn CurrentUserResolver>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            store,
            backend,
            users,
            activity,
            pending_deletes: Arc::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RelationStore> {
        &self.store
    }

    pub async fn current_user(&self, ctx: &RequestContext) -> RelationResult<User> {
        Ok(self.users.fetch_current_user(ctx).await?)
    }

    /// Grant a relation.
    ///
    /// The current user is required for audit attribution only; callers
    /// authorize the write themselves beforehand.
    ///
    /// # Errors
    /// - [`RelationError::InvalidDetail`] for structurally invalid tuples.
    /// - [`RelationError::Unauthenticated`] when no current user resolves.
    /// - [`RelationError::Conflict`] when the tuple already exists.
    /// - [`RelationError::CreatingRelationInStore`] when the store write fails;
    ///   the backend is not called.
    /// - [`RelationError::CreatingRelationInAuthzEngine`] when propagation
    ///   fails; the store keeps the record.
    pub async fn create(&self, ctx: &RequestContext, relation: Relation) -> RelationResult<Relation> {
        relation
            .validate()
            .map_err(|err| RelationError::InvalidDetail(err.to_string()))?;
        let user = self.current_user(ctx).await?;

        let created = self.store.create(relation).await.map_err(|err| match err {
            StoreError::Conflict(_) => RelationError::Conflict,
            other => RelationError::CreatingRelationInStore(other),
        })?;

        if let Err(err) = self.backend.add_relation(&created).await {
            tracing::warn!(
                error = %err,
                tuple = %created.tuple_string(),
                "relation stored but not propagated to authorization backend"
            );
            return Err(RelationError::CreatingRelationInAuthzEngine(err));
        }

        metrics::counter!("keyward_relation_writes_total", "op" => "create").increment(1);
        spawn_activity_log(
            self.activity.clone(),
            ctx,
            ACTIVITY_RELATION_CREATE,
            user.id,
            relation_log_data(&created),
        );
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> RelationResult<Relation> {
        let id = Uuid::parse_str(id.trim())
            .map_err(|_| RelationError::InvalidUuid(id.to_string()))?;
        self.store
            .get(id)
            .await
            .map_err(RelationError::from_lookup)
    }

    pub async fn list(&self) -> RelationResult<Vec<Relation>> {
        self.store.list().await.map_err(RelationError::Store)
    }

    /// Every stored grant held over `object`.
    pub async fn list_for_object(&self, object: &Object) -> RelationResult<Vec<Relation>> {
        self.store
            .list_for_object(object)
            .await
            .map_err(RelationError::Store)
    }

    /// Resolve a tuple by object, subject and role.
    pub async fn get_relation_by_fields(&self, relation: &Relation) -> RelationResult<Relation> {
        self.store
            .get_by_fields(relation)
            .await
            .map_err(RelationError::from_lookup)
    }

    /// Touch the stored record of an existing grant.
    ///
    /// The grant itself never changes and the backend is not called; a changed
    /// object, subject or role is a delete followed by a create.
    pub async fn update(&self, relation: Relation) -> RelationResult<Relation> {
        self.store.update(relation).await.map_err(|err| match err {
            StoreError::NotFound(_) => RelationError::NotExist,
            StoreError::Conflict(detail) => RelationError::InvalidDetail(detail),
            other => RelationError::Store(other),
        })
    }

    /// Revoke a relation identified by its tuple.
    ///
    /// # Errors
    /// - [`RelationError::NotExist`] when no matching tuple is stored.
    /// - [`RelationError::DeletingRelationInAuthzEngine`] when backend removal
    ///   fails; the store is left untouched.
    /// - [`RelationError::DeletingRelationInStore`] when the store removal fails
    ///   after the backend already revoked the grant.
    pub async fn delete(&self, ctx: &RequestContext, relation: &Relation) -> RelationResult<()> {
        let user = self.current_user(ctx).await?;
        let resolved = self.get_relation_by_fields(relation).await?;
        let id = resolved.id.ok_or(RelationError::NotExist)?;

        self.backend
            .delete_relation(&resolved)
            .await
            .map_err(RelationError::DeletingRelationInAuthzEngine)?;
        if let Err(err) = self.store.delete_by_id(id).await {
            self.pending_deletes.lock().await.insert(id);
            tracing::warn!(
                error = %err,
                tuple = %resolved.tuple_string(),
                "relation revoked but still stored; removal pending"
            );
            return Err(RelationError::DeletingRelationInStore(err));
        }
        self.pending_deletes.lock().await.remove(&id);

        metrics::counter!("keyward_relation_writes_total", "op" => "delete").increment(1);
        spawn_activity_log(
            self.activity.clone(),
            ctx,
            ACTIVITY_RELATION_DELETE,
            user.id,
            relation_log_data(&resolved),
        );
        Ok(())
    }

    /// Ask whether `user` may perform `action` on `object_namespace:object_id`.
    ///
    /// `Ok(false)` means denied; an error means the answer is unknown.
    pub async fn check_permission(
        &self,
        user: &User,
        object_namespace: &str,
        object_id: &str,
        action: &Action,
    ) -> RelationResult<bool> {
        let tuple = Relation::check_tuple(NS_USER, &user.id, object_namespace, object_id);
        match self.backend.check(&tuple, action).await {
            Ok(allowed) => {
                let outcome = if allowed { "allowed" } else { "denied" };
                metrics::counter!("keyward_permission_checks_total", "outcome" => outcome)
                    .increment(1);
                Ok(allowed)
            }
            Err(err) => {
                metrics::counter!("keyward_permission_checks_total", "outcome" => "error")
                    .increment(1);
                Err(RelationError::Backend(err))
            }
        }
    }

    /// Native batched check; `relations[i]` is paired with `actions[i]`.
    pub async fn bulk_check_permission(
        &self,
        relations: &[Relation],
        actions: &[Action],
    ) -> RelationResult<Vec<Permission>> {
        if relations.len() != actions.len() {
            return Err(RelationError::BulkShape(format!(
                "{} relations paired with {} actions",
                relations.len(),
                actions.len()
            )));
        }
        self.backend
            .bulk_check(relations, actions)
            .await
            .map_err(RelationError::Backend)
    }

    /// IDs of every object in `resource_namespace` the subject may `permission`.
    pub async fn lookup_resources(
        &self,
        resource_namespace: &str,
        permission: &str,
        subject_namespace: &str,
        subject_id: &str,
    ) -> RelationResult<Vec<String>> {
        self.backend
            .lookup_resources(resource_namespace, permission, subject_namespace, subject_id)
            .await
            .map_err(RelationError::Backend)
    }

    /// Revoke every relation held over a resource type, or over one resource of it.
    ///
    /// Only the backend is touched; the store does not index by resource type.
    pub async fn delete_subject_relations(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> RelationResult<()> {
        let user = self.current_user(ctx).await?;
        self.backend
            .delete_subject_relations(resource_type, resource_id)
            .await
            .map_err(RelationError::Backend)?;

        metrics::counter!("keyward_relation_writes_total", "op" => "delete_subject").increment(1);
        let mut data = HashMap::from([("resource_type".to_string(), resource_type.to_string())]);
        if let Some(resource_id) = resource_id {
            data.insert("resource_id".to_string(), resource_id.to_string());
        }
        spawn_activity_log(
            self.activity.clone(),
            ctx,
            ACTIVITY_RELATION_SUBJECT_DELETE,
            user.id,
            data,
        );
        Ok(())
    }

    /// Re-propagate every stored relation to the backend.
    ///
    /// Closes the window left by a create whose backend write failed. Safe to
    /// run at any time because backend adds are idempotent. Pending deletes are
    /// retried first; records whose removal still fails are not re-granted.
    pub async fn reconcile(&self) -> RelationResult<ReconcileReport> {
        let retired = self.retry_pending_deletes().await;
        let pending = self.pending_deletes.lock().await.clone();
        let relations = self.list().await?;
        let mut report = ReconcileReport {
            scanned: relations.len(),
            retired,
            ..ReconcileReport::default()
        };
        for relation in &relations {
            if relation.id.is_some_and(|id| pending.contains(&id)) {
                report.skipped += 1;
                continue;
            }
            match self.backend.add_relation(relation).await {
                Ok(()) => report.propagated += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        error = %err,
                        tuple = %relation.tuple_string(),
                        "failed to reconcile relation"
                    );
                }
            }
        }
        metrics::counter!("keyward_reconcile_propagated_total").increment(report.propagated as u64);
        metrics::counter!("keyward_reconcile_failures_total").increment(report.failed as u64);
        tracing::debug!(
            scanned = report.scanned,
            propagated = report.propagated,
            failed = report.failed,
            retired = report.retired,
            skipped = report.skipped,
            "reconciled relations"
        );
        Ok(report)
    }

    async fn retry_pending_deletes(&self) -> usize {
        let ids: Vec<Uuid> = self.pending_deletes.lock().await.iter().copied().collect();
        let mut retired = 0;
        for id in ids {
            match self.store.delete_by_id(id).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {
                    self.pending_deletes.lock().await.remove(&id);
                    retired += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, %id, "pending relation removal failed again");
                }
            }
        }
        retired
    }
}

fn relation_log_data(relation: &Relation) -> HashMap<String, String> {
    HashMap::from([
        ("object_id".to_string(), relation.object.id.clone()),
        ("object_namespace".to_string(), relation.object.namespace_id.clone()),
        ("subject_id".to_string(), relation.subject.id.clone()),
        ("subject_namespace".to_string(), relation.subject.namespace.clone()),
        ("role_id".to_string(), relation.subject.role_id.clone()),
    ])
}
