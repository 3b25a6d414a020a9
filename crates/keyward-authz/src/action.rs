use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const EDIT_PERMISSION: &str = "edit";
pub const VIEW_PERMISSION: &str = "view";
pub const DELETE_PERMISSION: &str = "delete";

/// Identifier of an operation a subject may attempt on an object.
///
/// Actions are namespace-agnostic; the authorization backend resolves them
/// against the action set of the role a subject holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn edit() -> Self {
        WellKnownAction::Edit.into()
    }

    pub fn view() -> Self {
        WellKnownAction::View.into()
    }

    pub fn delete() -> Self {
        WellKnownAction::Delete.into()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Actions used by the self-referential "can I edit/view this object" checks
/// that gate mutation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellKnownAction {
    Edit,
    View,
    Delete,
}

impl WellKnownAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WellKnownAction::Edit => EDIT_PERMISSION,
            WellKnownAction::View => VIEW_PERMISSION,
            WellKnownAction::Delete => DELETE_PERMISSION,
        }
    }
}

impl From<WellKnownAction> for Action {
    fn from(value: WellKnownAction) -> Self {
        Action::new(value.as_str())
    }
}

impl std::fmt::Display for WellKnownAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WellKnownAction {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            EDIT_PERMISSION => Ok(WellKnownAction::Edit),
            VIEW_PERMISSION => Ok(WellKnownAction::View),
            DELETE_PERMISSION => Ok(WellKnownAction::Delete),
            _ => Err(()),
        }
    }
}
