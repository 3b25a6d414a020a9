//! Audit activity sink.
//!
//! # Purpose
//! Records mutating operations (relation create/delete) as activities. Logging
//! is fire-and-forget: it runs on a detached task, is never awaited by the
//! mutation, and its failures are only reported locally.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::context::RequestContext;

pub const ACTIVITY_RELATION_CREATE: &str = "relation.create";
pub const ACTIVITY_RELATION_DELETE: &str = "relation.delete";
pub const ACTIVITY_RELATION_SUBJECT_DELETE: &str = "relation.subject_delete";

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("activity sink unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn log(
        &self,
        ctx: &RequestContext,
        action: &str,
        actor_id: &str,
        data: HashMap<String, String>,
    ) -> Result<(), ActivityError>;
}

/// Emits each activity as a structured `audit` tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivitySink;

#[async_trait]
impl ActivitySink for TracingActivitySink {
    async fn log(
        &self,
        _ctx: &RequestContext,
        action: &str,
        actor_id: &str,
        data: HashMap<String, String>,
    ) -> Result<(), ActivityError> {
        let data = serde_json::to_string(&data).map_err(anyhow::Error::from)?;
        tracing::info!(target: "audit", action, actor_id, %data, "activity");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub action: String,
    pub actor_id: String,
    pub data: HashMap<String, String>,
}

/// Keeps activities in memory; used by tests and embedders that ship them elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryActivitySink {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryActivitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivitySink for MemoryActivitySink {
    async fn log(
        &self,
        _ctx: &RequestContext,
        action: &str,
        actor_id: &str,
        data: HashMap<String, String>,
    ) -> Result<(), ActivityError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ActivityError::Unavailable("activity log poisoned".into()))?;
        entries.push(ActivityEntry {
            action: action.to_string(),
            actor_id: actor_id.to_string(),
            data,
        });
        Ok(())
    }
}

/// Log an activity on a task detached from the request's cancellation.
///
/// The returned handle is only useful to tests; callers never await it.
pub fn spawn_activity_log(
    sink: Arc<dyn ActivitySink>,
    ctx: &RequestContext,
    action: &'static str,
    actor_id: String,
    data: HashMap<String, String>,
) -> tokio::task::JoinHandle<()> {
    let ctx = ctx.detached();
    tokio::spawn(async move {
        if let Err(err) = sink.log(&ctx, action, &actor_id, data).await {
            metrics::counter!("keyward_activity_log_failures_total", "action" => action)
                .increment(1);
            tracing::warn!(error = %err, action, actor_id, "failed to log activity");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl ActivitySink for FailingSink {
        async fn log(
            &self,
            _ctx: &RequestContext,
            _action: &str,
            _actor_id: &str,
            _data: HashMap<String, String>,
        ) -> Result<(), ActivityError> {
            Err(ActivityError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn spawned_log_survives_request_cancellation() {
        let sink = MemoryActivitySink::new();
        let ctx = RequestContext::with_subject("user:u1");
        ctx.cancellation().cancel();
        let data = HashMap::from([("object_id".to_string(), "org-1".to_string())]);
        spawn_activity_log(
            Arc::new(sink.clone()),
            &ctx,
            ACTIVITY_RELATION_CREATE,
            "u1".to_string(),
            data.clone(),
        )
        .await
        .expect("join");

        assert_eq!(
            sink.entries(),
            vec![ActivityEntry {
                action: ACTIVITY_RELATION_CREATE.to_string(),
                actor_id: "u1".to_string(),
                data,
            }]
        );
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let ctx = RequestContext::anonymous();
        spawn_activity_log(
            Arc::new(FailingSink),
            &ctx,
            ACTIVITY_RELATION_DELETE,
            "u1".to_string(),
            HashMap::new(),
        )
        .await
        .expect("task completes without panicking");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_entries() {
        TracingActivitySink
            .log(
                &RequestContext::anonymous(),
                ACTIVITY_RELATION_SUBJECT_DELETE,
                "u1",
                HashMap::from([("resource_type".to_string(), "resource/dataset".to_string())]),
            )
            .await
            .expect("log");
    }
}
