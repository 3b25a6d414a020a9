//! Relation store: persistence of grant records.
//!
//! # Purpose
//! Holds the relation tuples themselves, independent of whether the
//! authorization backend currently reflects them. The store is the source of
//! truth for "does this grant record exist", which backs listing, audit and
//! delete-by-fields.
use async_trait::async_trait;
use keyward_authz::{Object, Relation};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Persist a new grant, assigning its ID and timestamps.
    ///
    /// Fails with [`StoreError::Conflict`] when an equivalent tuple exists.
    async fn create(&self, relation: Relation) -> StoreResult<Relation>;
    async fn get(&self, id: Uuid) -> StoreResult<Relation>;
    async fn list(&self) -> StoreResult<Vec<Relation>>;
    /// Every grant held over `object`, whatever the subject.
    async fn list_for_object(&self, object: &Object) -> StoreResult<Vec<Relation>>;
    /// Refresh `updated_at` of an existing grant. The tuple itself is immutable;
    /// a changed object/subject/role is rejected with [`StoreError::Conflict`].
    async fn update(&self, relation: Relation) -> StoreResult<Relation>;
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;
    /// Look up a grant by object, subject and role.
    async fn get_by_fields(&self, relation: &Relation) -> StoreResult<Relation>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
