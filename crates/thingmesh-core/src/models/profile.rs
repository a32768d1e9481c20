//! Profile domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configuration template that things in the same group connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub config: serde_json::Value,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProfile {
    pub id: Option<Uuid>,
    pub name: String,
    pub config: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}
