//! HTTP API request/response types.
//!
//! # Purpose
//! Payload shapes for the REST API and OpenAPI schema generation. Subject
//! strings are parsed into typed principals here, at the boundary.
use keyward_authz::{
    Action, AuthzError, Object, Permission, Principal, Relation, Resource,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

use crate::resource::{CheckRequest, ResourceCheck};

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub storage: String,
    pub durable: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

/// A grant as sent by clients: `subject` is a `"user:<id>"` or `"group:<id>"` principal.
#[derive(Debug, Serialize, Deserialize, ToSchema, IntoParams, Clone)]
#[into_params(parameter_in = Query)]
pub struct RelationTuple {
    pub object_id: String,
    pub object_namespace: String,
    pub subject: String,
    pub role: String,
}

impl RelationTuple {
    pub fn object(&self) -> Object {
        Object::new(self.object_id.clone(), self.object_namespace.clone())
    }

    pub fn into_relation(self) -> Result<Relation, AuthzError> {
        let principal: Principal = self.subject.parse()?;
        let object = self.object();
        Ok(Relation::new(object, principal.into_subject(self.role)))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RelationListResponse {
    pub items: Vec<Relation>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CheckItem {
    pub object_id: String,
    pub object_namespace: String,
    pub permission: String,
}

impl CheckItem {
    fn into_check(self) -> ResourceCheck {
        ResourceCheck::new(
            Resource::reference(self.object_namespace, self.object_id),
            Action::new(self.permission),
        )
    }
}

/// Check body in either shape: the legacy top-level single check or a `checks` list.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
pub struct CheckRequestBody {
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub object_namespace: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub checks: Option<Vec<CheckItem>>,
}

impl CheckRequestBody {
    /// Resolve the body into exactly one shape.
    pub fn into_request(self) -> Result<CheckRequest, String> {
        let legacy = self.object_id.is_some()
            || self.object_namespace.is_some()
            || self.permission.is_some();
        match (legacy, self.checks) {
            (true, Some(_)) => Err("send either a single check or a checks list, not both".into()),
            (false, None) => Err("missing check".into()),
            (false, Some(checks)) => Ok(CheckRequest::Bulk(
                checks.into_iter().map(CheckItem::into_check).collect(),
            )),
            (true, None) => match (self.object_id, self.object_namespace, self.permission) {
                (Some(object_id), Some(object_namespace), Some(permission)) => {
                    Ok(CheckRequest::Single(
                        CheckItem {
                            object_id,
                            object_namespace,
                            permission,
                        }
                        .into_check(),
                    ))
                }
                _ => Err("single check needs object_id, object_namespace and permission".into()),
            },
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct CheckResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Permission>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceCreateRequest {
    pub id: String,
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceBindingResponse {
    pub resource: Resource,
    pub relations: Vec<Relation>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResourceListQuery {
    pub namespace: String,
    /// Comma-separated permissions.
    pub permissions: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GlobalResourceListQuery {
    /// Comma-separated namespaces.
    pub namespaces: String,
    /// Comma-separated permissions.
    pub permissions: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceListResponse {
    pub resources: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct GlobalResourceListResponse {
    pub namespaces: HashMap<String, HashMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectRelationsQuery {
    pub resource_type: String,
    pub resource_id: Option<String>,
}

/// Split a comma-separated query value, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_parses_principal() {
        let tuple = RelationTuple {
            object_id: "org-1".into(),
            object_namespace: "organization".into(),
            subject: "group:g1".into(),
            role: "organization_viewer".into(),
        };
        let relation = tuple.into_relation().expect("relation");
        assert_eq!(relation.subject.namespace, "group");
        assert_eq!(relation.subject.id, "g1");

        let tuple = RelationTuple {
            object_id: "org-1".into(),
            object_namespace: "organization".into(),
            subject: "robot:r1".into(),
            role: "organization_viewer".into(),
        };
        assert!(tuple.into_relation().is_err());
    }

    #[test]
    fn check_body_shapes() {
        let single = CheckRequestBody {
            object_id: Some("p1".into()),
            object_namespace: Some("project".into()),
            permission: Some("edit".into()),
            checks: None,
        };
        assert!(matches!(single.into_request(), Ok(CheckRequest::Single(_))));

        let bulk = CheckRequestBody {
            checks: Some(vec![CheckItem {
                object_id: "p1".into(),
                object_namespace: "project".into(),
                permission: "view".into(),
            }]),
            ..CheckRequestBody::default()
        };
        assert!(matches!(bulk.into_request(), Ok(CheckRequest::Bulk(c)) if c.len() == 1));

        let both = CheckRequestBody {
            object_id: Some("p1".into()),
            checks: Some(vec![]),
            ..CheckRequestBody::default()
        };
        assert!(both.into_request().is_err());
        assert!(CheckRequestBody::default().into_request().is_err());

        let partial = CheckRequestBody {
            object_id: Some("p1".into()),
            ..CheckRequestBody::default()
        };
        assert!(partial.into_request().is_err());
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list("edit, view,,"), vec!["edit", "view"]);
        assert!(split_list("").is_empty());
    }
}
