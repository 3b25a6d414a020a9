//! Resources and their deterministic URNs.
//!
//! # Purpose
//! Provides the resource record API handlers authorize against and the pure
//! URN builder used to anchor it inside an organization/project.
//!
//! # Key invariants
//! - URN generation is pure: the same `(namespace_id, name, project_id)` always
//!   yields the same URN, which keeps resource upserts safe to retry.
//! - System-namespace resources (organization, project, group, user) use their
//!   bare name as URN.
//!
//! # Examples
//! ```rust
//! use keyward_authz::Resource;
//!
//! let dataset = Resource::new("ds-9", "resource/dataset", "sales", "org-1", "proj-42", "u1");
//! assert_eq!(dataset.urn, "r/resource/dataset/sales");
//!
//! let wildcard = Resource::new("", "resource/dataset", "", "org-1", "proj-42", "u1");
//! assert_eq!(wildcard.urn, "p/proj-42/resource/dataset");
//! ```
//!
//! # Common pitfalls
//! - Checks are evaluated against `id`, not `urn`; the URN is a stable lookup key.
use crate::namespace::is_system_namespace;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Resource {
    pub id: String,
    pub urn: String,
    pub name: String,
    pub namespace_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub user_id: String,
}

impl Resource {
    /// Build a resource and derive its URN.
    pub fn new(
        id: impl Into<String>,
        namespace_id: impl Into<String>,
        name: impl Into<String>,
        organization_id: impl Into<String>,
        project_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let mut resource = Self {
            id: id.into(),
            urn: String::new(),
            name: name.into(),
            namespace_id: namespace_id.into(),
            organization_id: organization_id.into(),
            project_id: project_id.into(),
            user_id: user_id.into(),
        };
        resource.urn = resource.create_urn();
        resource
    }

    /// Lookup-only resource carrying just what a permission check needs.
    pub fn reference(namespace_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace_id: namespace_id.into(),
            ..Self::default()
        }
    }

    /// Derive the resource URN.
    ///
    /// # Returns
    /// - `name` for system namespaces.
    /// - `p/{project_id}/{namespace_id}` for project-wide resources (empty name).
    /// - `r/{namespace_id}/{name}` otherwise.
    pub fn create_urn(&self) -> String {
        if is_system_namespace(&self.namespace_id) {
            return self.name.clone();
        }
        if self.name.is_empty() && !self.project_id.is_empty() {
            return format!("p/{}/{}", self.project_id, self.namespace_id);
        }
        format!("r/{}/{}", self.namespace_id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_namespace_urn_is_name() {
        let project = Resource::new("p-1", "project", "apollo", "org-1", "", "u1");
        assert_eq!(project.urn, "apollo");
        let org = Resource::new("org-1", "organization", "acme", "", "", "u1");
        assert_eq!(org.urn, "acme");
    }

    #[test]
    fn named_and_wildcard_resource_urns() {
        let named = Resource::new("ds-9", "resource/dataset", "sales", "org-1", "p-1", "u1");
        assert_eq!(named.urn, "r/resource/dataset/sales");

        let wildcard = Resource::new("", "resource/dataset", "", "org-1", "p-1", "u1");
        assert_eq!(wildcard.urn, "p/p-1/resource/dataset");
    }

    #[test]
    fn urn_is_idempotent() {
        let cases = [
            ("resource/dataset", "sales", "p-1"),
            ("resource/dataset", "", "p-1"),
            ("group", "admins", ""),
            ("servicedata_key", "region", "p-2"),
        ];
        for (namespace, name, project) in cases {
            let first = Resource::new("x", namespace, name, "org-1", project, "u1");
            let second = Resource::new("y", namespace, name, "org-2", project, "u2");
            assert_eq!(first.create_urn(), first.create_urn());
            assert_eq!(first.urn, second.urn);
        }
    }

    #[test]
    fn reference_only_carries_identity() {
        let reference = Resource::reference("project", "proj-42");
        assert_eq!(reference.id, "proj-42");
        assert_eq!(reference.namespace_id, "project");
        assert!(reference.urn.is_empty());
    }
}
