//! Postgres-backed implementation of the relation store.
//!
//! # What this module is
//! Implements [`RelationStore`] on a single `relations` table via `sqlx`. The
//! table is the durable record of every grant; the authorization backend holds
//! a derived copy used for evaluation.
//!
//! # Key invariants
//! - The tuple `(object_id, object_namespace, subject_id, subject_namespace, role_id)` is unique,
//!   enforced by the `relations_tuple_unique` constraint. A duplicate insert maps to
//!   [`StoreError::Conflict`].
//! - `id` is generated here (UUID v4) and never updated.
//!
//! # Concurrency model
//! - `sqlx::PgPool` manages concurrency; each call acquires a pooled connection.
//! - Only the relation-service mutation path writes; permission checks never touch this store.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")` so handlers can assume the
//!   schema exists.
//! - Connect and acquire timeouts are explicit and come from [`PostgresConfig`].
//! - Database URLs may contain credentials; never log `PostgresConfig::url`.
use super::{RelationStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_authz::{Object, Relation, Subject};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const RELATION_COLUMNS: &str = "id, object_id, object_namespace, subject_id, subject_namespace, \
                                role_id, created_at, updated_at";

/// Durable relation store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use authz::config::PostgresConfig;
/// use authz::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape of the `relations` table.
#[derive(Debug, Clone, FromRow)]
struct DbRelation {
    id: Uuid,
    object_id: String,
    object_namespace: String,
    subject_id: String,
    subject_namespace: String,
    role_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbRelation> for Relation {
    fn from(row: DbRelation) -> Self {
        Relation {
            id: Some(row.id),
            object: Object::new(row.object_id, row.object_namespace),
            subject: Subject::new(row.subject_id, row.subject_namespace, row.role_id),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            other => StoreError::Unexpected(other.into()),
        }
    }
}

impl PostgresStore {
    /// Connect to Postgres and run the embedded migrations.
    ///
    /// # Errors
    /// - Invalid URL, connection, pool or migration failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), pool)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Unexpected(err.into()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationStore for PostgresStore {
    async fn create(&self, relation: Relation) -> StoreResult<Relation> {
        let query = format!(
            "INSERT INTO relations (id, object_id, object_namespace, subject_id, \
             subject_namespace, role_id) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {RELATION_COLUMNS}"
        );
        let row: DbRelation = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(&relation.object.id)
            .bind(&relation.object.namespace_id)
            .bind(&relation.subject.id)
            .bind(&relation.subject.namespace)
            .bind(&relation.subject.role_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict(relation.tuple_string())
                } else {
                    err.into()
                }
            })?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Relation> {
        let query = format!("SELECT {RELATION_COLUMNS} FROM relations WHERE id = $1");
        let row: Option<DbRelation> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Relation::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Relation>> {
        let query = format!("SELECT {RELATION_COLUMNS} FROM relations ORDER BY created_at, id");
        let rows: Vec<DbRelation> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Relation::from).collect())
    }

    async fn list_for_object(&self, object: &Object) -> StoreResult<Vec<Relation>> {
        let query = format!(
            "SELECT {RELATION_COLUMNS} FROM relations WHERE object_id = $1 \
             AND object_namespace = $2 ORDER BY created_at, id"
        );
        let rows: Vec<DbRelation> = sqlx::query_as(&query)
            .bind(&object.id)
            .bind(&object.namespace_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Relation::from).collect())
    }

    async fn update(&self, relation: Relation) -> StoreResult<Relation> {
        let id = relation
            .id
            .ok_or_else(|| StoreError::NotFound("relation without id".into()))?;
        let existing = self.get(id).await?;
        if !existing.same_tuple(&relation) {
            return Err(StoreError::Conflict(format!(
                "relation {id} identity is immutable"
            )));
        }
        let query = format!(
            "UPDATE relations SET updated_at = now() WHERE id = $1 RETURNING {RELATION_COLUMNS}"
        );
        let row: DbRelation = sqlx::query_as(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM relations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_by_fields(&self, relation: &Relation) -> StoreResult<Relation> {
        let query = format!(
            "SELECT {RELATION_COLUMNS} FROM relations WHERE object_id = $1 \
             AND object_namespace = $2 AND subject_id = $3 AND subject_namespace = $4 \
             AND role_id = $5"
        );
        let row: Option<DbRelation> = sqlx::query_as(&query)
            .bind(&relation.object.id)
            .bind(&relation.object.namespace_id)
            .bind(&relation.subject.id)
            .bind(&relation.subject.namespace)
            .bind(&relation.subject.role_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Relation::from)
            .ok_or_else(|| StoreError::NotFound(relation.tuple_string()))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}
