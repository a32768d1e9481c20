//! Thing-to-profile connection model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Junction row linking a thing to a profile of the same group.
///
/// `group_id` is the group both ends share; it lets cascades remove the
/// junction rows of a group without joining through things.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub thing_id: Uuid,
    pub profile_id: Uuid,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
}
