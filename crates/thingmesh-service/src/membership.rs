//! Group membership operations.

use std::collections::HashSet;

use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult, ValidationError};
use thingmesh_core::models::membership::{MemberRole, Membership};
use thingmesh_core::page::{Page, PageMetadata};
use thingmesh_core::repository::{MembershipRepository, Store};
use thingmesh_core::Role;
use tracing::info;
use uuid::Uuid;

use crate::service::{ThingsService, non_empty};

fn check_member_id(member_id: &str) -> Result<(), ValidationError> {
    if member_id.is_empty() {
        return Err(ValidationError::MissingMemberId);
    }
    Ok(())
}

/// Validate a create/update batch and turn it into membership rows.
fn memberships(group_id: Uuid, entries: Vec<MemberRole>) -> MeshResult<Vec<Membership>> {
    non_empty(&entries)?;
    let mut seen = HashSet::new();
    for entry in &entries {
        check_member_id(&entry.member_id)?;
        if !entry.role.is_assignable() {
            return Err(ValidationError::InvalidRole.into());
        }
        if !seen.insert(entry.member_id.as_str()) {
            return Err(Error::conflict("membership"));
        }
    }
    Ok(entries
        .into_iter()
        .map(|e| Membership {
            group_id,
            member_id: e.member_id,
            role: e.role,
        })
        .collect())
}

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    /// Fail with `NotFound` unless every member already belongs to the
    /// group.
    async fn require_members<'a>(
        &self,
        group_id: Uuid,
        member_ids: impl IntoIterator<Item = &'a str>,
    ) -> MeshResult<()> {
        let existing: HashSet<String> = self
            .store
            .memberships()
            .list_by_group(group_id)
            .await?
            .into_iter()
            .map(|m| m.member_id)
            .collect();
        for member_id in member_ids {
            if !existing.contains(member_id) {
                return Err(Error::not_found("membership", member_id));
            }
        }
        Ok(())
    }

    /// Grant roles on a group. Requires Admin.
    pub async fn create_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        entries: Vec<MemberRole>,
    ) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        let batch = memberships(group_id, entries)?;
        self.resolver
            .authorize_group(&user_id, group_id, Role::Admin)
            .await?;

        let count = batch.len();
        self.store.memberships().create_batch(batch).await?;
        info!(%group_id, count, granted_by = %user_id, "Memberships created");
        Ok(())
    }

    /// Change the role of existing members. Requires Admin.
    pub async fn update_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        entries: Vec<MemberRole>,
    ) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        let batch = memberships(group_id, entries)?;
        self.resolver
            .authorize_group(&user_id, group_id, Role::Admin)
            .await?;
        self.require_members(group_id, batch.iter().map(|m| m.member_id.as_str()))
            .await?;

        let count = batch.len();
        self.store.memberships().update_batch(batch).await?;
        info!(%group_id, count, updated_by = %user_id, "Memberships updated");
        Ok(())
    }

    /// Revoke memberships. Requires Admin.
    pub async fn remove_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        member_ids: Vec<String>,
    ) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&member_ids)?;
        for member_id in &member_ids {
            check_member_id(member_id)?;
        }
        self.resolver
            .authorize_group(&user_id, group_id, Role::Admin)
            .await?;
        self.require_members(group_id, member_ids.iter().map(String::as_str))
            .await?;

        self.store
            .memberships()
            .delete_batch(group_id, &member_ids)
            .await?;
        info!(%group_id, count = member_ids.len(), revoked_by = %user_id, "Memberships removed");
        Ok(())
    }

    /// Memberships of a group. Requires Viewer; ordering by `id` or
    /// `name` sorts by member ID.
    pub async fn list_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        pm: PageMetadata,
    ) -> MeshResult<Page<Membership>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        self.resolver
            .authorize_group(&user_id, group_id, Role::Viewer)
            .await?;

        self.store.memberships().list(group_id, &query).await
    }
}

#[cfg(test)]
mod tests {
    use thingmesh_core::ErrorKind;

    use super::*;

    fn entry(member_id: &str, role: Role) -> MemberRole {
        MemberRole {
            member_id: member_id.into(),
            role,
        }
    }

    #[test]
    fn owner_role_is_not_assignable() {
        let err = memberships(Uuid::new_v4(), vec![entry("bob", Role::Owner)]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidRole)));
    }

    #[test]
    fn empty_member_id_is_rejected() {
        let err = memberships(Uuid::new_v4(), vec![entry("", Role::Viewer)]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingMemberId)));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = memberships(Uuid::new_v4(), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyList)));
    }

    #[test]
    fn repeated_member_in_batch_is_conflict() {
        let err = memberships(
            Uuid::new_v4(),
            vec![entry("bob", Role::Viewer), entry("bob", Role::Admin)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
