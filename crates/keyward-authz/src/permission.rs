use crate::{Action, Object};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Outcome of one `(object, action)` question in a bulk check.
///
/// Bulk results are not returned in input order; correlate them with
/// [`Permission::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub object_id: String,
    pub object_namespace: String,
    pub permission: String,
    pub allowed: bool,
}

impl Permission {
    pub fn new(object: &Object, action: &Action, allowed: bool) -> Self {
        Self {
            object_id: object.id.clone(),
            object_namespace: object.namespace_id.clone(),
            permission: action.as_str().to_string(),
            allowed,
        }
    }

    pub fn key(&self) -> (&str, &str, &str) {
        (&self.object_id, &self.object_namespace, &self.permission)
    }
}
