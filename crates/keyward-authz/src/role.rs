//! Well-known role catalog.
//!
//! # Purpose
//! Generates the `owner`/`editor`/`viewer` role identifiers of every
//! namespace and the default action bundle each role carries.
//!
//! # Key invariants
//! - Role IDs are `"<namespace>_<role>"`, e.g. `organization_owner`.
//! - Display names are `"<Namespace> <Role>"`, e.g. `Organization Owner`.
//!
//! # Examples
//! ```rust
//! use keyward_authz::{Role, RoleKind};
//!
//! let role = Role::well_known("organization", RoleKind::Owner);
//! assert_eq!(role.id, "organization_owner");
//! assert_eq!(role.name, "Organization Owner");
//! ```
use crate::action::{DELETE_PERMISSION, EDIT_PERMISSION, VIEW_PERMISSION};
use crate::namespace::capitalize;
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role bound to a project through the resource → project relation.
pub const RESOURCE_PROJECT_ROLE: &str = "project";
/// Role bound to an organization through the resource → organization relation.
pub const RESOURCE_ORGANIZATION_ROLE: &str = "organization";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Owner,
    Editor,
    Viewer,
}

impl RoleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleKind::Owner => "owner",
            RoleKind::Editor => "editor",
            RoleKind::Viewer => "viewer",
        }
    }

    /// Default actions granted by this role kind.
    pub fn actions(self) -> &'static [&'static str] {
        match self {
            RoleKind::Owner => &[EDIT_PERMISSION, VIEW_PERMISSION, DELETE_PERMISSION],
            RoleKind::Editor => &[EDIT_PERMISSION, VIEW_PERMISSION],
            RoleKind::Viewer => &[VIEW_PERMISSION],
        }
    }

    /// Recover the kind from a generated role ID such as `project_editor`.
    pub fn from_role_id(role_id: &str) -> Option<Self> {
        let (_, suffix) = role_id.rsplit_once('_')?;
        suffix.parse().ok()
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleKind {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(RoleKind::Owner),
            "editor" => Ok(RoleKind::Editor),
            "viewer" => Ok(RoleKind::Viewer),
            _ => Err(AuthzError::InvalidRole(value.to_string())),
        }
    }
}

/// Named bundle of permitted actions scoped to a namespace.
///
/// Only the `id` travels inside a relation; expanding a role into actions is
/// the authorization backend's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub namespace_id: String,
}

impl Role {
    pub fn well_known(namespace_id: &str, kind: RoleKind) -> Self {
        Self {
            id: role_id(namespace_id, kind),
            name: format!("{} {}", capitalize(namespace_id), capitalize(kind.as_str())),
            namespace_id: namespace_id.to_string(),
        }
    }

    /// All well-known roles of a namespace, owner first.
    pub fn well_known_for(namespace_id: &str) -> Vec<Self> {
        [RoleKind::Owner, RoleKind::Editor, RoleKind::Viewer]
            .into_iter()
            .map(|kind| Self::well_known(namespace_id, kind))
            .collect()
    }
}

pub fn role_id(namespace_id: &str, kind: RoleKind) -> String {
    format!("{namespace_id}_{kind}")
}

/// Parse a role ID into its namespace and kind.
///
/// # Errors
/// - [`AuthzError::InvalidRole`] when the ID has no `_<kind>` suffix.
pub fn parse_role_id(role_id: &str) -> AuthzResult<(&str, RoleKind)> {
    let (namespace, suffix) = role_id
        .rsplit_once('_')
        .ok_or_else(|| AuthzError::InvalidRole(role_id.to_string()))?;
    if namespace.is_empty() {
        return Err(AuthzError::InvalidRole(role_id.to_string()));
    }
    Ok((namespace, suffix.parse()?))
}
