//! In-process authorization backend built on Casbin.
//!
//! # Purpose and responsibility
//! Implements [`AuthzBackend`] with an in-memory Casbin enforcer so the
//! service can run without an external relation-graph evaluator.
//!
//! # Model
//! - A relation becomes the domain-scoped grouping
//!   `g(<subject_ns>:<subject_id>, <role_id>, <object_ns>:<object_id>)`.
//! - A role grants actions through policies `p(<role_id>, <action>)`. Policies
//!   for well-known role IDs (`*_owner`, `*_editor`, `*_viewer`) are seeded the
//!   first time the role is seen; other roles grant nothing unless
//!   [`CasbinBackend::grant_role_actions`] registers actions for them.
//! - A check is `enforce(subject, object, action)`.
//!
//! # Key invariants and assumptions
//! - Evaluation is one hop: group membership and org → project inheritance are
//!   not expanded.
//! - All mutations hold the enforcer write lock; checks share the read lock.
use super::{AuthzBackend, BackendError, BackendResult};
use async_trait::async_trait;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use keyward_authz::{Action, Permission, Relation, RoleKind};
use std::collections::BTreeSet;
use tokio::sync::RwLock;

// Embed the Casbin model so deployments don't need a separate config file.
const MODEL_CONF: &str = include_str!("model.conf");

pub struct CasbinBackend {
    enforcer: RwLock<Enforcer>,
}

impl CasbinBackend {
    /// Build an empty backend from the embedded model.
    ///
    /// # Errors
    /// - Casbin model or adapter initialisation failures.
    pub async fn new() -> BackendResult<Self> {
        let model = DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(engine_error)?;
        let adapter = MemoryAdapter::default();
        let enforcer = Enforcer::new(model, adapter)
            .await
            .map_err(engine_error)?;
        Ok(Self {
            enforcer: RwLock::new(enforcer),
        })
    }

    /// Register the actions a custom role grants.
    pub async fn grant_role_actions(&self, role_id: &str, actions: &[&str]) -> BackendResult<()> {
        let mut enforcer = self.enforcer.write().await;
        for action in actions {
            let rule = vec![role_id.to_string(), action.to_string()];
            if !enforcer.has_policy(rule.clone()) {
                enforcer.add_policy(rule).await.map_err(engine_error)?;
            }
        }
        Ok(())
    }

    async fn seed_role(enforcer: &mut Enforcer, role_id: &str) -> BackendResult<()> {
        let Some(kind) = RoleKind::from_role_id(role_id) else {
            return Ok(());
        };
        for action in kind.actions() {
            let rule = vec![role_id.to_string(), action.to_string()];
            if !enforcer.has_policy(rule.clone()) {
                enforcer.add_policy(rule).await.map_err(engine_error)?;
            }
        }
        Ok(())
    }

    fn evaluate(enforcer: &Enforcer, relation: &Relation, action: &Action) -> BackendResult<bool> {
        let subject = principal_key(&relation.subject.namespace, &relation.subject.id);
        let object = principal_key(&relation.object.namespace_id, &relation.object.id);
        enforcer
            .enforce((subject.as_str(), object.as_str(), action.as_str()))
            .map_err(engine_error)
    }
}

#[async_trait]
impl AuthzBackend for CasbinBackend {
    async fn add_relation(&self, relation: &Relation) -> BackendResult<()> {
        if relation.subject.role_id.is_empty() {
            return Err(BackendError::Rejected(format!(
                "relation {} has no role",
                relation.tuple_string()
            )));
        }
        let mut enforcer = self.enforcer.write().await;
        Self::seed_role(&mut enforcer, &relation.subject.role_id).await?;
        let rule = grouping_rule(relation);
        if !enforcer.has_grouping_policy(rule.clone()) {
            enforcer
                .add_grouping_policy(rule)
                .await
                .map_err(engine_error)?;
        }
        Ok(())
    }

    async fn delete_relation(&self, relation: &Relation) -> BackendResult<()> {
        let mut enforcer = self.enforcer.write().await;
        let rule = grouping_rule(relation);
        if enforcer.has_grouping_policy(rule.clone()) {
            enforcer
                .remove_grouping_policy(rule)
                .await
                .map_err(engine_error)?;
            enforcer.build_role_links().map_err(engine_error)?;
        }
        Ok(())
    }

    async fn delete_subject_relations(
        &self,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> BackendResult<()> {
        let mut enforcer = self.enforcer.write().await;
        let exact = resource_id.map(|id| principal_key(resource_type, id));
        let prefix = format!("{resource_type}:");
        let doomed: Vec<Vec<String>> = enforcer
            .get_grouping_policy()
            .into_iter()
            .filter(|rule| {
                let Some(domain) = rule.get(2) else {
                    return false;
                };
                match &exact {
                    Some(exact) => domain == exact,
                    None => domain.starts_with(&prefix),
                }
            })
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            resource_type,
            resource_id = resource_id.unwrap_or("*"),
            removed = doomed.len(),
            "removing subject relations"
        );
        enforcer
            .remove_grouping_policies(doomed)
            .await
            .map_err(engine_error)?;
        enforcer.build_role_links().map_err(engine_error)?;
        Ok(())
    }

    async fn check(&self, relation: &Relation, action: &Action) -> BackendResult<bool> {
        let enforcer = self.enforcer.read().await;
        Self::evaluate(&enforcer, relation, action)
    }

    async fn bulk_check(
        &self,
        relations: &[Relation],
        actions: &[Action],
    ) -> BackendResult<Vec<Permission>> {
        if relations.len() != actions.len() {
            return Err(BackendError::Rejected(format!(
                "bulk check needs one action per relation, got {} relations and {} actions",
                relations.len(),
                actions.len()
            )));
        }
        let enforcer = self.enforcer.read().await;
        relations
            .iter()
            .zip(actions)
            .map(|(relation, action)| {
                let allowed = Self::evaluate(&enforcer, relation, action)?;
                Ok(Permission::new(&relation.object, action, allowed))
            })
            .collect()
    }

    async fn lookup_resources(
        &self,
        resource_type: &str,
        permission: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> BackendResult<Vec<String>> {
        let enforcer = self.enforcer.read().await;
        let subject = principal_key(subject_type, subject_id);
        let prefix = format!("{resource_type}:");
        let mut ids = BTreeSet::new();
        for rule in enforcer.get_filtered_grouping_policy(0, vec![subject.clone()]) {
            let Some(domain) = rule.get(2) else {
                continue;
            };
            let Some(object_id) = domain.strip_prefix(&prefix) else {
                continue;
            };
            if ids.contains(object_id) {
                continue;
            }
            let allowed = enforcer
                .enforce((subject.as_str(), domain.as_str(), permission))
                .map_err(engine_error)?;
            if allowed {
                ids.insert(object_id.to_string());
            }
        }
        Ok(ids.into_iter().collect())
    }
}

fn principal_key(namespace: &str, id: &str) -> String {
    format!("{namespace}:{id}")
}

fn grouping_rule(relation: &Relation) -> Vec<String> {
    vec![
        principal_key(&relation.subject.namespace, &relation.subject.id),
        relation.subject.role_id.clone(),
        principal_key(&relation.object.namespace_id, &relation.object.id),
    ]
}

fn engine_error(err: casbin::Error) -> BackendError {
    BackendError::Unexpected(anyhow::Error::new(err))
}
