//! Backup and restore of whole entity graphs.

use std::collections::HashSet;

use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult, ValidationError};
use thingmesh_core::models::snapshot::{Scope, Snapshot};
use thingmesh_core::repository::{
    GroupRepository, ProfileRepository, SnapshotRepository, Store, ThingRepository,
};
use thingmesh_core::{ErrorKind, Role};
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::ThingsService;

fn outside_scope(entity: &str, id: Uuid) -> Error {
    ValidationError::MalformedEntity(format!("{entity} {id} belongs to another scope")).into()
}

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    fn require_admin(&self, user_id: &str) -> MeshResult<()> {
        if self.resolver.is_admin(user_id) {
            return Ok(());
        }
        warn!(user_id, "Global scope requires a platform administrator");
        Err(Error::denied("platform administrator required"))
    }

    /// Export every entity reachable from `scope`. Global scope requires
    /// a platform administrator; org scope the org owner or an
    /// administrator.
    pub async fn backup(&self, token: &str, scope: Scope) -> MeshResult<Snapshot> {
        let user_id = self.identify(token).await?;
        let org_ids = match scope {
            Scope::Global => {
                self.require_admin(&user_id)?;
                None
            }
            Scope::Org(org_id) => {
                self.resolver
                    .authorize_org(&user_id, org_id, Role::Owner)
                    .await?;
                Some(vec![org_id])
            }
        };

        let snapshot = self.store.snapshots().export(org_ids).await?;
        info!(
            ?scope,
            orgs = snapshot.orgs.len(),
            groups = snapshot.groups.len(),
            things = snapshot.things.len(),
            requested_by = %user_id,
            "Backup exported"
        );
        Ok(snapshot)
    }

    /// Write a snapshot back in one transaction, overwriting entities
    /// with the same IDs.
    ///
    /// Org scope is allowed for administrators, the owner of the existing
    /// org, or, when the org does not exist yet, the owner recorded in
    /// the snapshot.
    pub async fn restore(&self, token: &str, scope: Scope, snapshot: Snapshot) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        snapshot.validate(scope)?;

        match scope {
            Scope::Global => self.require_admin(&user_id)?,
            Scope::Org(org_id) => {
                let current = match self
                    .resolver
                    .authorize_org(&user_id, org_id, Role::Owner)
                    .await
                {
                    Ok((org, _)) => Some(org),
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        let recorded_owner = snapshot.orgs.iter().all(|o| o.owner_id == user_id);
                        if !(recorded_owner || self.resolver.is_admin(&user_id)) {
                            warn!(%user_id, %org_id, "Restore of unknown org denied");
                            return Err(Error::denied("only the org owner may restore it"));
                        }
                        None
                    }
                    Err(e) => return Err(e),
                };
                if let Some(current) = current {
                    if snapshot.orgs.iter().any(|o| o.owner_id != current.owner_id) {
                        return Err(ValidationError::MalformedEntity(
                            "snapshot changes the org owner".into(),
                        )
                        .into());
                    }
                }
                self.check_within_org(org_id, &snapshot).await?;
            }
        }

        let (orgs, groups, things) = (
            snapshot.orgs.len(),
            snapshot.groups.len(),
            snapshot.things.len(),
        );
        self.store.snapshots().import(snapshot).await?;
        info!(
            ?scope,
            orgs,
            groups,
            things,
            restored_by = %user_id,
            "Backup restored"
        );
        Ok(())
    }

    /// Refuse an org-scoped restore that would move existing groups,
    /// things or profiles out of another org.
    async fn check_within_org(&self, org_id: Uuid, snapshot: &Snapshot) -> MeshResult<()> {
        let group_ids: Vec<Uuid> = snapshot.groups.iter().map(|g| g.id).collect();
        let in_scope: HashSet<Uuid> = group_ids.iter().copied().collect();

        for existing in self.store.groups().list_by_ids(&group_ids).await? {
            if existing.org_id != org_id {
                return Err(outside_scope("group", existing.id));
            }
        }

        let thing_ids: Vec<Uuid> = snapshot.things.iter().map(|t| t.id).collect();
        for existing in self.store.things().list_by_ids(&thing_ids).await? {
            if !in_scope.contains(&existing.group_id) {
                return Err(outside_scope("thing", existing.id));
            }
        }

        let profile_ids: Vec<Uuid> = snapshot.profiles.iter().map(|p| p.id).collect();
        for existing in self.store.profiles().list_by_ids(&profile_ids).await? {
            if !in_scope.contains(&existing.group_id) {
                return Err(outside_scope("profile", existing.id));
            }
        }

        Ok(())
    }
}
