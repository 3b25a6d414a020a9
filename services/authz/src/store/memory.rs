//! In-memory implementation of the relation store.
//!
//! # Purpose
//! Implements [`RelationStore`] with a `HashMap` guarded by a
//! `tokio::sync::RwLock`. Used for local development, tests, and deployments
//! where the relation records do not need to survive a restart.
//!
//! # Durability and consistency
//! - **Not durable**: all grants are lost on process restart. The
//!   authorization backend may still hold them; run a reconciliation after
//!   swapping stores.
//! - **Single-process consistency**: the tuple-uniqueness check and the insert
//!   happen under the same write lock.
//!
//! # Performance characteristics
//! - `get_by_fields` and `list_for_object` scan all records. Fine for development workloads.
use super::{RelationStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use keyward_authz::{Object, Relation};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    relations: Arc<RwLock<HashMap<Uuid, Relation>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationStore for InMemoryStore {
    async fn create(&self, relation: Relation) -> StoreResult<Relation> {
        let mut relations = self.relations.write().await;
        if relations.values().any(|existing| existing.same_tuple(&relation)) {
            return Err(StoreError::Conflict(relation.tuple_string()));
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        let stored = Relation {
            id: Some(id),
            created_at: Some(now),
            updated_at: Some(now),
            ..relation
        };
        relations.insert(id, stored.clone());
        metrics::gauge!("keyward_relations_total").set(relations.len() as f64);
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Relation> {
        self.relations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Relation>> {
        Ok(self.relations.read().await.values().cloned().collect())
    }

    async fn list_for_object(&self, object: &Object) -> StoreResult<Vec<Relation>> {
        Ok(self
            .relations
            .read()
            .await
            .values()
            .filter(|relation| relation.object == *object)
            .cloned()
            .collect())
    }

    async fn update(&self, relation: Relation) -> StoreResult<Relation> {
        let id = relation
            .id
            .ok_or_else(|| StoreError::NotFound("relation without id".into()))?;
        let mut relations = self.relations.write().await;
        let existing = relations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !existing.same_tuple(&relation) {
            return Err(StoreError::Conflict(format!(
                "relation {id} identity is immutable"
            )));
        }
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        let mut relations = self.relations.write().await;
        if relations.remove(&id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        metrics::gauge!("keyward_relations_total").set(relations.len() as f64);
        Ok(())
    }

    async fn get_by_fields(&self, relation: &Relation) -> StoreResult<Relation> {
        self.relations
            .read()
            .await
            .values()
            .find(|existing| existing.same_tuple(relation))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(relation.tuple_string()))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
