//! Relation model shared by keyward services.
//!
//! # Purpose
//! Centralizes the data model of the relationship-based authorization engine:
//! namespaces, roles, actions, principals, relation tuples, resources and
//! permission-check results.
//!
//! # How it fits
//! The authz service stores relations, forwards them to the authorization
//! backend and answers permission checks using the types defined here. This
//! crate performs no I/O.
//!
//! # Key invariants
//! - Role IDs are `"<namespace>_<role>"`.
//! - Principals are `user:<id>` or `group:<id>`.
//! - Resource URNs are a pure function of namespace, name and project.
//!
//! # Examples
//! ```rust
//! use keyward_authz::{Action, Principal, Relation, Object};
//!
//! let principal: Principal = "user:u1".parse().unwrap();
//! let relation = Relation::new(
//!     Object::new("proj-42", "project"),
//!     principal.into_subject("project_editor"),
//! );
//! assert_eq!(relation.subject.namespace, "user");
//! assert_eq!(Action::edit().as_str(), "edit");
//! ```

mod action;
mod errors;
pub mod namespace;
mod permission;
mod principal;
mod relation;
mod resource;
mod role;

pub use action::{Action, DELETE_PERMISSION, EDIT_PERMISSION, VIEW_PERMISSION, WellKnownAction};
pub use errors::{AuthzError, AuthzResult};
pub use namespace::Namespace;
pub use permission::Permission;
pub use principal::{Principal, PrincipalKind};
pub use relation::{Object, Relation, Subject};
pub use resource::Resource;
pub use role::{
    RESOURCE_ORGANIZATION_ROLE, RESOURCE_PROJECT_ROLE, Role, RoleKind, parse_role_id, role_id,
};
