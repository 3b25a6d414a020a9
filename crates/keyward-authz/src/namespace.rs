//! Namespace catalog for the relation model.
//!
//! # Purpose
//! Maps the well-known entity kinds (organization, project, group, user,
//! service-data key) to namespace identifiers and builds the identifiers of
//! dynamically registered resource namespaces.
//!
//! # How it fits
//! Every [`crate::Object`] and [`crate::Subject`] carries a namespace ID from
//! this catalog. URN generation and principal parsing special-case the system
//! namespaces defined here.
//!
//! # Key invariants
//! - System namespace IDs are fixed for the lifetime of the process.
//! - Resource namespaces are always `resource/<type>`.
//!
//! # Examples
//! ```rust
//! use keyward_authz::namespace::{NS_PROJECT, is_system_namespace, resource_namespace};
//!
//! assert!(is_system_namespace(NS_PROJECT));
//! assert_eq!(resource_namespace("dataset"), "resource/dataset");
//! assert!(!is_system_namespace("resource/dataset"));
//! ```
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const NS_ORGANIZATION: &str = "organization";
pub const NS_PROJECT: &str = "project";
pub const NS_GROUP: &str = "group";
pub const NS_USER: &str = "user";
pub const NS_SERVICEDATA_KEY: &str = "servicedata_key";

/// Prefix shared by all dynamically registered resource namespaces.
pub const RESOURCE_NAMESPACE_PREFIX: &str = "resource/";

/// Namespaces that URN generation and principal parsing treat as built-in.
pub const SYSTEM_NAMESPACES: [&str; 4] = [NS_ORGANIZATION, NS_PROJECT, NS_GROUP, NS_USER];

/// Catalog entry describing a category of object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Namespace {
    pub id: String,
    pub name: String,
}

impl Namespace {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn organization() -> Self {
        Self::new(NS_ORGANIZATION, "Organization")
    }

    pub fn project() -> Self {
        Self::new(NS_PROJECT, "Project")
    }

    pub fn group() -> Self {
        Self::new(NS_GROUP, "Group")
    }

    pub fn user() -> Self {
        Self::new(NS_USER, "User")
    }

    pub fn servicedata_key() -> Self {
        Self::new(NS_SERVICEDATA_KEY, "Service Data Key")
    }

    /// Build the catalog entry for a resource type, e.g. `dataset`.
    pub fn resource(kind: &str) -> Self {
        Self::new(resource_namespace(kind), capitalize(kind))
    }

    pub fn is_system(&self) -> bool {
        is_system_namespace(&self.id)
    }
}

/// Build the namespace ID of a resource type.
///
/// # Returns
/// - `resource/{kind}`. Inputs that already carry the prefix are returned as-is.
pub fn resource_namespace(kind: &str) -> String {
    if kind.starts_with(RESOURCE_NAMESPACE_PREFIX) {
        return kind.to_string();
    }
    format!("{RESOURCE_NAMESPACE_PREFIX}{kind}")
}

pub fn is_system_namespace(namespace_id: &str) -> bool {
    SYSTEM_NAMESPACES.contains(&namespace_id)
}

pub fn is_resource_namespace(namespace_id: &str) -> bool {
    namespace_id
        .strip_prefix(RESOURCE_NAMESPACE_PREFIX)
        .is_some_and(|kind| !kind.is_empty())
}

pub(crate) fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_namespaces_are_recognised() {
        for ns in [NS_ORGANIZATION, NS_PROJECT, NS_GROUP, NS_USER] {
            assert!(is_system_namespace(ns), "{ns} should be a system namespace");
        }
        assert!(!is_system_namespace(NS_SERVICEDATA_KEY));
        assert!(!is_system_namespace("resource/dataset"));
    }

    #[test]
    fn resource_namespace_is_prefixed_once() {
        assert_eq!(resource_namespace("dataset"), "resource/dataset");
        assert_eq!(resource_namespace("resource/dataset"), "resource/dataset");
        assert!(is_resource_namespace("resource/dataset"));
        assert!(!is_resource_namespace("resource/"));
        assert!(!is_resource_namespace(NS_PROJECT));
    }

    #[test]
    fn catalog_entries() {
        assert_eq!(Namespace::organization().id, "organization");
        assert!(Namespace::project().is_system());
        let dataset = Namespace::resource("dataset");
        assert_eq!(dataset.id, "resource/dataset");
        assert_eq!(dataset.name, "Dataset");
        assert!(!dataset.is_system());
    }
}
