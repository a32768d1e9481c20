//! Backup snapshots.
//!
//! A snapshot is the full entity graph reachable from a [`Scope`]: the
//! organizations, their groups, and everything the groups own. Entities
//! keep their original IDs and timestamps so a restore reproduces the
//! graph exactly.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connection::Connection;
use super::group::Group;
use super::membership::Membership;
use super::org::Org;
use super::profile::Profile;
use super::thing::Thing;
use crate::error::ValidationError;
use crate::page::MAX_NAME_SIZE;

/// What a backup or restore covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Scope {
    /// Every organization on the platform.
    Global,
    /// A single organization and its subtree.
    Org(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub orgs: Vec<Org>,
    pub groups: Vec<Group>,
    pub things: Vec<Thing>,
    pub profiles: Vec<Profile>,
    pub connections: Vec<Connection>,
    pub memberships: Vec<Membership>,
}

fn malformed(msg: impl Into<String>) -> ValidationError {
    ValidationError::MalformedEntity(msg.into())
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= MAX_NAME_SIZE
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
            && self.groups.is_empty()
            && self.things.is_empty()
            && self.profiles.is_empty()
            && self.connections.is_empty()
            && self.memberships.is_empty()
    }

    /// Check that the snapshot is a closed, consistent graph inside `scope`.
    ///
    /// Every reference must resolve to an entity carried by the snapshot
    /// itself, so restoring into an empty store never produces dangling
    /// rows.
    pub fn validate(&self, scope: Scope) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyList);
        }

        if let Scope::Org(org_id) = scope {
            if self.orgs.len() != 1 || self.orgs[0].id != org_id {
                return Err(malformed(format!(
                    "snapshot must contain exactly organization {org_id}"
                )));
            }
        }

        let mut org_ids = HashSet::new();
        for org in &self.orgs {
            if !org_ids.insert(org.id) {
                return Err(malformed(format!("duplicate organization {}", org.id)));
            }
            if org.owner_id.is_empty() || !valid_name(&org.name) {
                return Err(malformed(format!("organization {}", org.id)));
            }
        }

        let mut group_names = HashSet::new();
        let mut group_ids = HashSet::new();
        for group in &self.groups {
            if !org_ids.contains(&group.org_id) {
                return Err(malformed(format!(
                    "group {} references unknown organization {}",
                    group.id, group.org_id
                )));
            }
            if !valid_name(&group.name) || !group_names.insert((group.org_id, &group.name)) {
                return Err(malformed(format!("group {}", group.id)));
            }
            if !group_ids.insert(group.id) {
                return Err(malformed(format!("duplicate group {}", group.id)));
            }
        }

        let mut thing_groups = HashMap::new();
        let mut keys = HashSet::new();
        for thing in &self.things {
            if !group_ids.contains(&thing.group_id) {
                return Err(malformed(format!(
                    "thing {} references unknown group {}",
                    thing.id, thing.group_id
                )));
            }
            if thing.key.is_empty() || !keys.insert(thing.key.as_str()) {
                return Err(malformed(format!("thing {} key", thing.id)));
            }
            if thing_groups.insert(thing.id, thing.group_id).is_some() {
                return Err(malformed(format!("duplicate thing {}", thing.id)));
            }
        }

        let mut profile_groups = HashMap::new();
        for profile in &self.profiles {
            if !group_ids.contains(&profile.group_id) {
                return Err(malformed(format!(
                    "profile {} references unknown group {}",
                    profile.id, profile.group_id
                )));
            }
            if profile_groups.insert(profile.id, profile.group_id).is_some() {
                return Err(malformed(format!("duplicate profile {}", profile.id)));
            }
        }

        let mut pairs = HashSet::new();
        for conn in &self.connections {
            let thing_group = thing_groups.get(&conn.thing_id);
            let profile_group = profile_groups.get(&conn.profile_id);
            match (thing_group, profile_group) {
                (Some(t), Some(p)) if t == p && *t == conn.group_id => {}
                _ => {
                    return Err(malformed(format!(
                        "connection {} -> {}",
                        conn.thing_id, conn.profile_id
                    )));
                }
            }
            if !pairs.insert((conn.thing_id, conn.profile_id)) {
                return Err(malformed(format!(
                    "duplicate connection {} -> {}",
                    conn.thing_id, conn.profile_id
                )));
            }
        }

        let mut members = HashSet::new();
        for m in &self.memberships {
            if !group_ids.contains(&m.group_id)
                || m.member_id.is_empty()
                || !m.role.is_assignable()
                || !members.insert((m.group_id, m.member_id.as_str()))
            {
                return Err(malformed(format!(
                    "membership {} on group {}",
                    m.member_id, m.group_id
                )));
            }
        }

        Ok(())
    }
}
