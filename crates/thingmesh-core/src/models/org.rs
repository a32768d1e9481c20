//! Organization domain model.
//!
//! Organizations are the top-level tenant. Every group belongs to exactly
//! one organization, and the organization owner holds implicit `Owner`
//! rights on all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: Uuid,
    /// User ID of the owner, as issued by the identity service.
    pub owner_id: String,
    pub name: String,
    pub description: String,
    /// Arbitrary key-value metadata.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new organization. The caller becomes owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrg {
    pub id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrg {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
