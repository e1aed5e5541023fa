//! Compartment node and lifecycle state types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a compartment as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Creating,
    Active,
    Inactive,
    Deleting,
    Deleted,
    /// Any state this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

fn default_state() -> LifecycleState {
    LifecycleState::Active
}

/// A compartment in the tenancy tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompartmentNode {
    /// OCID of the compartment.
    pub id: String,
    /// Display name, unique among siblings.
    pub name: String,
    /// OCID of the parent; `None` only for the tenancy root.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_state")]
    pub lifecycle_state: LifecycleState,
}

impl CompartmentNode {
    /// The tenancy root.
    pub fn root(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: None,
            lifecycle_state: LifecycleState::Active,
        }
    }

    /// An active compartment under `parent_id`.
    pub fn child(id: &str, name: &str, parent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: Some(parent_id.to_string()),
            lifecycle_state: LifecycleState::Active,
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.lifecycle_state = state;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle_state == LifecycleState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_state_round_trips_screaming_case() {
        let json = serde_json::to_string(&LifecycleState::Deleting).unwrap();
        assert_eq!(json, "\"DELETING\"");
        let state: LifecycleState = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(state, LifecycleState::Active);
    }

    #[test]
    fn unknown_lifecycle_state_does_not_fail() {
        let state: LifecycleState = serde_json::from_str("\"FROZEN\"").unwrap();
        assert_eq!(state, LifecycleState::Unknown);
    }

    #[test]
    fn node_defaults_to_active_root() {
        let node: CompartmentNode =
            serde_json::from_str(r#"{"id": "ocid1.tenancy.oc1..x", "name": "acme"}"#).unwrap();
        assert!(node.is_root());
        assert!(node.is_active());
    }
}
