//! Org and group operations.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult};
use thingmesh_core::models::group::{CreateGroup, Group, UpdateGroup};
use thingmesh_core::models::org::{CreateOrg, Org, UpdateOrg};
use thingmesh_core::page::{ListScope, Page, PageMetadata};
use thingmesh_core::repository::{GroupRepository, MembershipRepository, OrgRepository, Store};
use thingmesh_core::Role;
use tracing::info;
use uuid::Uuid;

use crate::service::{ThingsService, check_metadata, check_name, distinct, non_empty};

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    // -----------------------------------------------------------------------
    // Orgs
    // -----------------------------------------------------------------------

    /// Create an org owned by the caller.
    pub async fn create_org(&self, token: &str, input: CreateOrg) -> MeshResult<Org> {
        let user_id = self.identify(token).await?;
        check_name(&input.name)?;
        let metadata = check_metadata(input.metadata)?;

        let id = match input.id {
            Some(id) => id,
            None => self.new_id()?,
        };
        let now = Utc::now();
        let org = self
            .store
            .orgs()
            .create(Org {
                id,
                owner_id: user_id,
                name: input.name,
                description: input.description,
                metadata,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(org_id = %org.id, owner_id = %org.owner_id, "Org created");
        Ok(org)
    }

    pub async fn view_org(&self, token: &str, org_id: Uuid) -> MeshResult<Org> {
        let user_id = self.identify(token).await?;
        let (org, _) = self
            .resolver
            .authorize_org(&user_id, org_id, Role::Viewer)
            .await?;
        Ok(org)
    }

    /// Only the owner or a platform administrator may update an org.
    pub async fn update_org(&self, token: &str, org_id: Uuid, input: UpdateOrg) -> MeshResult<Org> {
        let user_id = self.identify(token).await?;
        if let Some(name) = &input.name {
            check_name(name)?;
        }
        let input = UpdateOrg {
            metadata: input.metadata.map(|m| check_metadata(Some(m))).transpose()?,
            ..input
        };
        self.resolver
            .authorize_org(&user_id, org_id, Role::Owner)
            .await?;

        let org = self.store.orgs().update(org_id, input).await?;
        info!(%org_id, updated_by = %user_id, "Org updated");
        Ok(org)
    }

    /// Orgs the caller owns or holds at least one group membership in;
    /// every org for administrators.
    pub async fn list_orgs(&self, token: &str, pm: PageMetadata) -> MeshResult<Page<Org>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;

        if self.resolver.is_admin(&user_id) {
            return self.store.orgs().list(None, &query).await;
        }

        let mut org_ids: BTreeSet<Uuid> = self
            .store
            .orgs()
            .ids_by_owner(&user_id)
            .await?
            .into_iter()
            .collect();
        let group_ids: Vec<Uuid> = self
            .store
            .memberships()
            .list_by_member(&user_id)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect();
        org_ids.extend(
            self.store
                .groups()
                .list_by_ids(&group_ids)
                .await?
                .into_iter()
                .map(|g| g.org_id),
        );

        let org_ids: Vec<Uuid> = org_ids.into_iter().collect();
        self.store.orgs().list(Some(&org_ids), &query).await
    }

    /// Remove an org with every group it owns and their contents.
    pub async fn remove_org(&self, token: &str, org_id: Uuid) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        self.resolver
            .authorize_org(&user_id, org_id, Role::Owner)
            .await?;

        self.store.orgs().delete(org_id).await?;
        info!(%org_id, removed_by = %user_id, "Org removed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create groups under `org_id` in one transaction. Requires Editor
    /// at org scope.
    pub async fn create_groups(
        &self,
        token: &str,
        org_id: Uuid,
        groups: Vec<CreateGroup>,
    ) -> MeshResult<Vec<Group>> {
        let user_id = self.identify(token).await?;
        non_empty(&groups)?;
        let mut names = HashSet::new();
        for group in &groups {
            check_name(&group.name)?;
            if !names.insert(group.name.as_str()) {
                return Err(Error::conflict("group"));
            }
        }
        self.resolver
            .authorize_org(&user_id, org_id, Role::Editor)
            .await?;

        let now = Utc::now();
        let mut batch = Vec::with_capacity(groups.len());
        for input in groups {
            let id = match input.id {
                Some(id) => id,
                None => self.new_id()?,
            };
            batch.push(Group {
                id,
                org_id,
                name: input.name,
                description: input.description,
                metadata: check_metadata(input.metadata)?,
                created_at: now,
                updated_at: now,
            });
        }

        let created = self.store.groups().create_batch(batch).await?;
        info!(%org_id, count = created.len(), created_by = %user_id, "Groups created");
        Ok(created)
    }

    pub async fn view_group(&self, token: &str, group_id: Uuid) -> MeshResult<Group> {
        let user_id = self.identify(token).await?;
        let (group, _) = self
            .resolver
            .authorize_group(&user_id, group_id, Role::Viewer)
            .await?;
        Ok(group)
    }

    pub async fn update_group(
        &self,
        token: &str,
        group_id: Uuid,
        input: UpdateGroup,
    ) -> MeshResult<Group> {
        let user_id = self.identify(token).await?;
        if let Some(name) = &input.name {
            check_name(name)?;
        }
        let input = UpdateGroup {
            metadata: input.metadata.map(|m| check_metadata(Some(m))).transpose()?,
            ..input
        };
        self.resolver
            .authorize_group(&user_id, group_id, Role::Admin)
            .await?;

        let group = self.store.groups().update(group_id, input).await?;
        info!(%group_id, updated_by = %user_id, "Group updated");
        Ok(group)
    }

    /// Groups visible to the caller.
    pub async fn list_groups(&self, token: &str, pm: PageMetadata) -> MeshResult<Page<Group>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        let scope = match self.resolver.visible_group_ids(&user_id).await? {
            None => ListScope::All,
            Some(ids) => ListScope::Ids(ids),
        };
        self.store.groups().list(&scope, &query).await
    }

    /// Groups of one org. Owners and administrators see all of them;
    /// members see the groups they belong to.
    pub async fn list_groups_by_org(
        &self,
        token: &str,
        org_id: Uuid,
        pm: PageMetadata,
    ) -> MeshResult<Page<Group>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        let (_, role) = self
            .resolver
            .authorize_org(&user_id, org_id, Role::Viewer)
            .await?;

        let scope = if role == Role::Owner {
            ListScope::Within(vec![org_id])
        } else {
            let member_of: Vec<Uuid> = self
                .store
                .memberships()
                .list_by_member(&user_id)
                .await?
                .into_iter()
                .map(|m| m.group_id)
                .collect();
            let in_org = self
                .store
                .groups()
                .list_by_ids(&member_of)
                .await?
                .into_iter()
                .filter(|g| g.org_id == org_id)
                .map(|g| g.id)
                .collect();
            ListScope::Ids(in_org)
        };
        self.store.groups().list(&scope, &query).await
    }

    /// Remove groups and everything they own in one transaction.
    /// Requires Admin on every group.
    pub async fn remove_groups(&self, token: &str, group_ids: Vec<Uuid>) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&group_ids)?;
        let ids = distinct(group_ids);
        self.resolver
            .authorize_groups(&user_id, ids.iter().copied(), Role::Admin)
            .await?;

        self.store.groups().delete_batch(&ids).await?;
        info!(count = ids.len(), removed_by = %user_id, "Groups removed");
        Ok(())
    }
}
