#![allow(dead_code)]

use async_trait::async_trait;
use authz::activity::MemoryActivitySink;
use authz::backend::{AuthzBackend, BackendError, BackendResult};
use authz::context::ContextUserResolver;
use authz::relation::RelationService;
use authz::resource::ResourceAuthz;
use authz::store::memory::InMemoryStore;
use authz::store::{RelationStore, StoreError, StoreResult};
use keyward_authz::{Action, Object, Permission, Relation};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Add(String),
    Delete(String),
    DeleteSubjectRelations(String, Option<String>),
    Check(String, String),
    BulkCheck(usize),
    Lookup(String, String, String, String),
}

/// Backend double that records every call and answers from an allow-list.
#[derive(Default)]
pub struct SpyBackend {
    calls: Mutex<Vec<BackendCall>>,
    allowed: Mutex<HashSet<(String, String, String, String)>>,
    fail_writes: AtomicBool,
    fail_checks_on: Mutex<Option<String>>,
    panic_checks_on: Mutex<Option<String>>,
    check_delay: Mutex<Option<Duration>>,
    completed_checks: AtomicUsize,
}

impl SpyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allow `user:<user_id>` to perform `action` on `object_ns:object_id`.
    pub fn allow(&self, user_id: &str, object_ns: &str, object_id: &str, action: &str) {
        self.allowed.lock().expect("lock").insert((
            user_id.to_string(),
            object_ns.to_string(),
            object_id.to_string(),
            action.to_string(),
        ));
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_checks_on(&self, object_id: &str) {
        *self.fail_checks_on.lock().expect("lock") = Some(object_id.to_string());
    }

    /// Make checks on `object_id` panic instead of answering.
    pub fn panic_checks_on(&self, object_id: &str) {
        *self.panic_checks_on.lock().expect("lock") = Some(object_id.to_string());
    }

    pub fn delay_checks(&self, delay: Duration) {
        *self.check_delay.lock().expect("lock") = Some(delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn completed_checks(&self) -> usize {
        self.completed_checks.load(Ordering::SeqCst)
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().expect("lock").push(call);
    }

    fn write_result(&self) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("spy backend down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthzBackend for SpyBackend {
    async fn add_relation(&self, relation: &Relation) -> BackendResult<()> {
        self.record(BackendCall::Add(relation.tuple_string()));
        self.write_result()
    }

    async fn delete_relation(&self, relation: &Relation) -> BackendResult<()> {
        self.record(BackendCall::Delete(relation.tuple_string()));
        self.write_result()
    }

    async fn delete_subject_relations(
        &self,
        resource_type: &str,
        resource_id: Option<&str>,
    ) -> BackendResult<()> {
        self.record(BackendCall::DeleteSubjectRelations(
            resource_type.to_string(),
            resource_id.map(str::to_string),
        ));
        self.write_result()
    }

    async fn check(&self, relation: &Relation, action: &Action) -> BackendResult<bool> {
        self.record(BackendCall::Check(
            relation.tuple_string(),
            action.as_str().to_string(),
        ));
        let failing = self.fail_checks_on.lock().expect("lock").clone();
        if failing.as_deref() == Some(relation.object.id.as_str()) {
            return Err(BackendError::Unavailable(format!(
                "cannot evaluate {}",
                relation.object.id
            )));
        }
        let panicking = self.panic_checks_on.lock().expect("lock").clone();
        if panicking.as_deref() == Some(relation.object.id.as_str()) {
            panic!("spy backend blew up on {}", relation.object.id);
        }
        let delay = *self.check_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.completed_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.allowed.lock().expect("lock").contains(&(
            relation.subject.id.clone(),
            relation.object.namespace_id.clone(),
            relation.object.id.clone(),
            action.as_str().to_string(),
        )))
    }

    async fn bulk_check(
        &self,
        relations: &[Relation],
        actions: &[Action],
    ) -> BackendResult<Vec<Permission>> {
        self.record(BackendCall::BulkCheck(relations.len()));
        let mut out = Vec::with_capacity(relations.len());
        for (relation, action) in relations.iter().zip(actions) {
            let allowed = self.allowed.lock().expect("lock").contains(&(
                relation.subject.id.clone(),
                relation.object.namespace_id.clone(),
                relation.object.id.clone(),
                action.as_str().to_string(),
            ));
            out.push(Permission::new(&relation.object, action, allowed));
        }
        Ok(out)
    }

    async fn lookup_resources(
        &self,
        resource_type: &str,
        permission: &str,
        subject_type: &str,
        subject_id: &str,
    ) -> BackendResult<Vec<String>> {
        self.record(BackendCall::Lookup(
            resource_type.to_string(),
            permission.to_string(),
            subject_type.to_string(),
            subject_id.to_string(),
        ));
        let mut ids: Vec<String> = self
            .allowed
            .lock()
            .expect("lock")
            .iter()
            .filter(|(user, ns, _, action)| {
                subject_type == "user"
                    && user == subject_id
                    && ns == resource_type
                    && action == permission
            })
            .map(|(_, _, id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct FailingStore;

#[async_trait]
impl RelationStore for FailingStore {
    async fn create(&self, _relation: Relation) -> StoreResult<Relation> {
        Err(StoreError::Unexpected(anyhow::anyhow!("disk full")))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Relation> {
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Relation>> {
        Ok(Vec::new())
    }

    async fn list_for_object(&self, _object: &Object) -> StoreResult<Vec<Relation>> {
        Ok(Vec::new())
    }

    async fn update(&self, _relation: Relation) -> StoreResult<Relation> {
        Err(StoreError::Unexpected(anyhow::anyhow!("disk full")))
    }

    async fn delete_by_id(&self, _id: Uuid) -> StoreResult<()> {
        Err(StoreError::Unexpected(anyhow::anyhow!("disk full")))
    }

    async fn get_by_fields(&self, relation: &Relation) -> StoreResult<Relation> {
        Err(StoreError::NotFound(relation.tuple_string()))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// In-memory store whose deletes can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyDeleteStore {
    inner: InMemoryStore,
    fail_deletes: Arc<AtomicBool>,
}

impl FlakyDeleteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelationStore for FlakyDeleteStore {
    async fn create(&self, relation: Relation) -> StoreResult<Relation> {
        self.inner.create(relation).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Relation> {
        self.inner.get(id).await
    }

    async fn list(&self) -> StoreResult<Vec<Relation>> {
        self.inner.list().await
    }

    async fn list_for_object(&self, object: &Object) -> StoreResult<Vec<Relation>> {
        self.inner.list_for_object(object).await
    }

    async fn update(&self, relation: Relation) -> StoreResult<Relation> {
        self.inner.update(relation).await
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(anyhow::anyhow!("connection reset")));
        }
        self.inner.delete_by_id(id).await
    }

    async fn get_by_fields(&self, relation: &Relation) -> StoreResult<Relation> {
        self.inner.get_by_fields(relation).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

pub struct Harness {
    pub store: InMemoryStore,
    pub backend: Arc<SpyBackend>,
    pub activity: MemoryActivitySink,
    pub relations: Arc<RelationService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let backend = SpyBackend::new();
        let activity = MemoryActivitySink::new();
        let relations = Arc::new(RelationService::new(
            Arc::new(store.clone()),
            backend.clone(),
            Arc::new(ContextUserResolver),
            Arc::new(activity.clone()),
        ));
        Self {
            store,
            backend,
            activity,
            relations,
        }
    }

    pub fn facade(&self, check_api_limit: usize) -> ResourceAuthz {
        ResourceAuthz::new(self.relations.clone(), check_api_limit)
    }
}

/// Wait until the detached activity task has logged `count` entries.
pub async fn wait_for_activity(sink: &MemoryActivitySink, count: usize) {
    for _ in 0..100 {
        if sink.entries().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
