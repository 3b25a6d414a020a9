//! Principal strings (`"namespace:id"`) parsed into typed subjects.
//!
//! # Purpose
//! Transport layers receive subjects as `user:<id>` or `group:<id>`. This
//! module splits such a string once at the boundary so the rest of the
//! service only ever handles a [`Principal`].
//!
//! # Key invariants
//! - Only the `user` and `group` namespaces are principals.
//! - The ID part is non-empty and is preserved exactly (it may contain `:`).
//!
//! # Examples
//! ```rust
//! use keyward_authz::{Principal, PrincipalKind};
//!
//! let principal: Principal = "group:g-7".parse().unwrap();
//! assert_eq!(principal.kind, PrincipalKind::Group);
//! assert_eq!(principal.id, "g-7");
//! assert_eq!(principal.to_string(), "group:g-7");
//! ```
use crate::namespace::{NS_GROUP, NS_USER};
use crate::{AuthzError, Subject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    pub fn namespace(self) -> &'static str {
        match self {
            PrincipalKind::User => NS_USER,
            PrincipalKind::Group => NS_GROUP,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            NS_USER => Some(PrincipalKind::User),
            NS_GROUP => Some(PrincipalKind::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: String,
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::User,
            id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::Group,
            id: id.into(),
        }
    }

    /// Turn the principal into the subject side of a relation.
    pub fn into_subject(self, role_id: impl Into<String>) -> Subject {
        Subject {
            id: self.id,
            namespace: self.kind.namespace().to_string(),
            role_id: role_id.into(),
        }
    }
}

impl std::str::FromStr for Principal {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (namespace, id) = value
            .split_once(':')
            .ok_or_else(|| AuthzError::InvalidPrincipal(value.to_string()))?;
        let kind = PrincipalKind::from_namespace(namespace)
            .ok_or_else(|| AuthzError::InvalidPrincipal(value.to_string()))?;
        if id.trim().is_empty() {
            return Err(AuthzError::InvalidPrincipal(value.to_string()));
        }
        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.namespace(), self.id)
    }
}
