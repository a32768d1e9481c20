//! Group membership model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

/// A role granted to a user on a single group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: Uuid,
    pub member_id: String,
    pub role: Role,
}

/// One entry of a create/update membership batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRole {
    pub member_id: String,
    pub role: Role,
}
