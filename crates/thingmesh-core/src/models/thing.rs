//! Thing (device) domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A device resource owned by a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    /// Device credential. Unique across all groups.
    pub key: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateThing {
    pub id: Option<Uuid>,
    pub name: String,
    /// Generated when absent.
    pub key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateThing {
    pub name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
