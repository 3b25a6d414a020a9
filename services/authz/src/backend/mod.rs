//! Authorization backend adapter.
//!
//! # Purpose
//! Boundary to the external relation-graph evaluator. The backend holds a
//! derived copy of the relation tuples and is the source of truth for
//! "is this allowed"; this service never evaluates permissions itself.
//!
//! # Key invariants and assumptions
//! - Implementations are shared across concurrent permission checks and must
//!   be safe for concurrent use.
//! - `check` distinguishes "denied" (`Ok(false)`) from "could not determine"
//!   (`Err`); implementations must never collapse an evaluation failure into a
//!   denial.
//! - `add_relation` is idempotent, which lets reconciliation re-propagate
//!   tuples blindly.
use async_trait::async_trait;
use keyward_authz::{Action, Permission, Relation};
use thiserror::Error;

pub mod casbin_backend;

pub use casbin_backend::CasbinBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("authorization backend unavailable: {0}")]
    Unavailable(String),
    #[error("authorization backend rejected request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait AuthzBackend: Send + Sync {
    /// Add a relation tuple to the evaluable graph.
    async fn add_relation(&self, relation: &Relation) -> BackendResult<()>;
    /// Remove a relation tuple from the evaluable graph.
    async fn delete_relation(&self, relation: &Relation) -> BackendResult<()>;
    /// Remove every relation whose object is in `resource_type`, optionally
    /// restricted to a single object ID.
    async fn delete_subject_relations(
        &self,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> BackendResult<()>;
    /// Check whether the subject of a (role-less) tuple may perform `action` on its object.
    async fn check(&self, relation: &Relation, action: &Action) -> BackendResult<bool>;
    /// Check `relations[i]` against `actions[i]` for every `i`.
    async fn bulk_check(
        &self,
        relations: &[Relation],
        actions: &[Action],
    ) -> BackendResult<Vec<Permission>>;
    /// IDs of every object in `resource_type` the subject may perform `permission` on.
    async fn lookup_resources(
        &self,
        resource_type: &str,
        permission: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> BackendResult<Vec<String>>;
}
