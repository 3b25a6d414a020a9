//! Relation tuples: "subject holds role on object".
//!
//! # Purpose
//! Defines the [`Object`], [`Subject`] and [`Relation`] records shared by the
//! relation store, the authorization backend and the HTTP layer.
//!
//! # Key invariants
//! - The effective identity of a relation is
//!   `(object.id, object.namespace_id, subject.id, subject.namespace, subject.role_id)`.
//! - `id` is assigned by the store on creation and never changes afterwards.
//! - A grant is never edited in place; changing it means delete + create.
//!
//! # Examples
//! ```rust
//! use keyward_authz::{Object, Relation, Subject};
//!
//! let relation = Relation::new(
//!     Object::new("org-1", "organization"),
//!     Subject::new("u1", "user", "organization_owner"),
//! );
//! assert!(relation.id.is_none());
//! assert!(relation.validate().is_ok());
//! ```
use crate::{AuthzError, AuthzResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// What a relation is held over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Object {
    pub id: String,
    pub namespace_id: String,
}

impl Object {
    pub fn new(id: impl Into<String>, namespace_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace_id: namespace_id.into(),
        }
    }
}

/// Who holds a relation, and under which role.
///
/// `role_id` is empty on check tuples, where only the subject identity matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Subject {
    pub id: String,
    pub namespace: String,
    #[serde(default)]
    pub role_id: String,
}

impl Subject {
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        role_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            role_id: role_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Relation {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub object: Object,
    pub subject: Subject,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Relation {
    pub fn new(object: Object, subject: Subject) -> Self {
        Self {
            id: None,
            object,
            subject,
            created_at: None,
            updated_at: None,
        }
    }

    /// Build the role-less tuple used to ask "can this subject act on this object".
    pub fn check_tuple(
        subject_namespace: &str,
        subject_id: &str,
        object_namespace: &str,
        object_id: &str,
    ) -> Self {
        Self::new(
            Object::new(object_id, object_namespace),
            Subject::new(subject_id, subject_namespace, ""),
        )
    }

    /// Structural validation of a grant.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRelation`] naming the first empty field.
    pub fn validate(&self) -> AuthzResult<()> {
        let fields = [
            ("object id", &self.object.id),
            ("object namespace", &self.object.namespace_id),
            ("subject id", &self.subject.id),
            ("subject namespace", &self.subject.namespace),
            ("subject role", &self.subject.role_id),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AuthzError::InvalidRelation(format!("missing {name}")));
            }
        }
        Ok(())
    }

    /// Compare effective identities, ignoring ID and timestamps.
    pub fn same_tuple(&self, other: &Relation) -> bool {
        self.object == other.object && self.subject == other.subject
    }

    /// Render the tuple as `object_ns:object_id#role@subject_ns:subject_id` for logs.
    pub fn tuple_string(&self) -> String {
        format!(
            "{}:{}#{}@{}:{}",
            self.object.namespace_id,
            self.object.id,
            self.subject.role_id,
            self.subject.namespace,
            self.subject.id
        )
    }
}
