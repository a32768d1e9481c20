//! Role resolution: who may do what on which group or org.
//!
//! A user's effective role on a group is, in order of precedence:
//! 1. `Owner` when the user is a configured platform administrator,
//! 2. `Owner` when the user owns the group's org,
//! 3. the role stored on the user's membership of the group.
//!
//! On an org, the effective role of a non-owner is the highest role the
//! user holds on any of the org's groups.

use std::collections::{BTreeSet, HashSet};

use thingmesh_core::error::{Error, MeshResult};
use thingmesh_core::models::group::Group;
use thingmesh_core::models::org::Org;
use thingmesh_core::repository::{GroupRepository, MembershipRepository, OrgRepository, Store};
use thingmesh_core::Role;
use tracing::warn;
use uuid::Uuid;

/// Read-only role lookups over a [`Store`]. Safe to share between
/// concurrent calls.
#[derive(Clone)]
pub struct RoleResolver<S: Store> {
    store: S,
    admins: HashSet<String>,
}

impl<S: Store> RoleResolver<S> {
    pub fn new(store: S, admins: HashSet<String>) -> Self {
        Self { store, admins }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }

    /// Effective role of `user_id` on `group`, if any.
    pub async fn group_role(&self, user_id: &str, group: &Group) -> MeshResult<Option<Role>> {
        if self.is_admin(user_id) {
            return Ok(Some(Role::Owner));
        }
        let org = self.store.orgs().get_by_id(group.org_id).await?;
        if org.owner_id == user_id {
            return Ok(Some(Role::Owner));
        }
        let membership = self.store.memberships().find(group.id, user_id).await?;
        Ok(membership.map(|m| m.role))
    }

    /// Effective role of `user_id` on `org`, if any.
    pub async fn org_role(&self, user_id: &str, org: &Org) -> MeshResult<Option<Role>> {
        if self.is_admin(user_id) || org.owner_id == user_id {
            return Ok(Some(Role::Owner));
        }
        let memberships = self.store.memberships().list_by_member(user_id).await?;
        if memberships.is_empty() {
            return Ok(None);
        }
        let group_ids: Vec<Uuid> = memberships.iter().map(|m| m.group_id).collect();
        let in_org: HashSet<Uuid> = self
            .store
            .groups()
            .list_by_ids(&group_ids)
            .await?
            .into_iter()
            .filter(|g| g.org_id == org.id)
            .map(|g| g.id)
            .collect();

        Ok(memberships
            .into_iter()
            .filter(|m| in_org.contains(&m.group_id))
            .map(|m| m.role)
            .max())
    }

    /// Allow iff `user_id` holds at least `required` on the group.
    ///
    /// An unknown group is `NotFound`; an insufficient role is
    /// `Authorization`.
    pub async fn resolve(&self, user_id: &str, group_id: Uuid, required: Role) -> MeshResult<()> {
        self.authorize_group(user_id, group_id, required)
            .await
            .map(|_| ())
    }

    /// Like [`Self::resolve`], returning the group and the role held.
    pub async fn authorize_group(
        &self,
        user_id: &str,
        group_id: Uuid,
        required: Role,
    ) -> MeshResult<(Group, Role)> {
        let group = self.store.groups().get_by_id(group_id).await?;
        match self.group_role(user_id, &group).await? {
            Some(role) if role >= required => Ok((group, role)),
            held => {
                warn!(
                    user_id,
                    %group_id,
                    required = %required,
                    held = ?held,
                    "Group access denied"
                );
                Err(Error::denied(format!("{required} role required on group")))
            }
        }
    }

    /// Allow iff `user_id` holds at least `required` at org scope.
    pub async fn authorize_org(
        &self,
        user_id: &str,
        org_id: Uuid,
        required: Role,
    ) -> MeshResult<(Org, Role)> {
        let org = self.store.orgs().get_by_id(org_id).await?;
        match self.org_role(user_id, &org).await? {
            Some(role) if role >= required => Ok((org, role)),
            held => {
                warn!(
                    user_id,
                    %org_id,
                    required = %required,
                    held = ?held,
                    "Org access denied"
                );
                Err(Error::denied(format!("{required} role required on org")))
            }
        }
    }

    /// Check `required` on each distinct group once.
    pub async fn authorize_groups(
        &self,
        user_id: &str,
        group_ids: impl IntoIterator<Item = Uuid>,
        required: Role,
    ) -> MeshResult<()> {
        let distinct: HashSet<Uuid> = group_ids.into_iter().collect();
        for group_id in distinct {
            self.authorize_group(user_id, group_id, required).await?;
        }
        Ok(())
    }

    /// IDs of every group the user can see: groups of owned orgs plus
    /// groups with a membership. `None` for administrators, who see all.
    pub async fn visible_group_ids(&self, user_id: &str) -> MeshResult<Option<Vec<Uuid>>> {
        if self.is_admin(user_id) {
            return Ok(None);
        }

        let owned = self.store.orgs().ids_by_owner(user_id).await?;
        let mut visible: BTreeSet<Uuid> = self
            .store
            .groups()
            .ids_by_orgs(&owned)
            .await?
            .into_iter()
            .collect();
        visible.extend(
            self.store
                .memberships()
                .list_by_member(user_id)
                .await?
                .into_iter()
                .map(|m| m.group_id),
        );
        Ok(Some(visible.into_iter().collect()))
    }
}
