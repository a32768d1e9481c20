//! Thing and profile operations.

use std::collections::HashSet;

use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult, ValidationError};
use thingmesh_core::models::profile::{CreateProfile, Profile, UpdateProfile};
use thingmesh_core::models::thing::{CreateThing, Thing, UpdateThing};
use thingmesh_core::page::{ListScope, Page, PageMetadata};
use thingmesh_core::repository::{ProfileRepository, Store, ThingRepository};
use thingmesh_core::Role;
use tracing::info;
use uuid::Uuid;

use crate::service::{ThingsService, check_metadata, check_name, distinct, non_empty};

/// Profile configuration defaults to an empty object and must otherwise
/// be one.
fn check_config(config: Option<serde_json::Value>) -> Result<serde_json::Value, ValidationError> {
    match config {
        None | Some(serde_json::Value::Null) => Ok(serde_json::Value::Object(Default::default())),
        Some(value @ serde_json::Value::Object(_)) => Ok(value),
        Some(_) => Err(ValidationError::MalformedEntity(
            "profile config must be a JSON object".into(),
        )),
    }
}

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    /// Rows held by any group visible to `user_id`.
    async fn visible_groups_scope(&self, user_id: &str) -> MeshResult<ListScope> {
        Ok(match self.resolver.visible_group_ids(user_id).await? {
            None => ListScope::All,
            Some(ids) => ListScope::Within(ids),
        })
    }

    // -----------------------------------------------------------------------
    // Things
    // -----------------------------------------------------------------------

    /// Create things in one transaction. Requires Editor on the group.
    /// Things without a key get one from the ID provider.
    pub async fn create_things(
        &self,
        token: &str,
        group_id: Uuid,
        things: Vec<CreateThing>,
    ) -> MeshResult<Vec<Thing>> {
        let user_id = self.identify(token).await?;
        non_empty(&things)?;
        let mut keys = HashSet::new();
        for thing in &things {
            check_name(&thing.name)?;
            if let Some(key) = thing.key.as_deref().filter(|k| !k.is_empty()) {
                if !keys.insert(key) {
                    return Err(Error::conflict("thing"));
                }
            }
        }
        self.resolver
            .authorize_group(&user_id, group_id, Role::Editor)
            .await?;

        let mut batch = Vec::with_capacity(things.len());
        for input in things {
            let id = match input.id {
                Some(id) => id,
                None => self.new_id()?,
            };
            let key = match input.key.filter(|k| !k.is_empty()) {
                Some(key) => key,
                None => self.new_id()?.to_string(),
            };
            batch.push(Thing {
                id,
                group_id,
                name: input.name,
                key,
                metadata: check_metadata(input.metadata)?,
            });
        }

        let created = self.store.things().create_batch(batch).await?;
        info!(%group_id, count = created.len(), created_by = %user_id, "Things created");
        Ok(created)
    }

    /// Fetch a thing, then check `required` on its group.
    pub(crate) async fn authorize_thing(
        &self,
        user_id: &str,
        thing_id: Uuid,
        required: Role,
    ) -> MeshResult<Thing> {
        let thing = self.store.things().get_by_id(thing_id).await?;
        self.resolver
            .authorize_group(user_id, thing.group_id, required)
            .await?;
        Ok(thing)
    }

    pub async fn view_thing(&self, token: &str, thing_id: Uuid) -> MeshResult<Thing> {
        let user_id = self.identify(token).await?;
        self.authorize_thing(&user_id, thing_id, Role::Viewer).await
    }

    pub async fn update_thing(
        &self,
        token: &str,
        thing_id: Uuid,
        input: UpdateThing,
    ) -> MeshResult<Thing> {
        let user_id = self.identify(token).await?;
        if let Some(name) = &input.name {
            check_name(name)?;
        }
        let input = UpdateThing {
            metadata: input.metadata.map(|m| check_metadata(Some(m))).transpose()?,
            ..input
        };
        self.authorize_thing(&user_id, thing_id, Role::Editor)
            .await?;

        let thing = self.store.things().update(thing_id, input).await?;
        info!(%thing_id, updated_by = %user_id, "Thing updated");
        Ok(thing)
    }

    /// Replace a thing's key. A key held by another thing is a conflict
    /// and leaves the old key in place.
    pub async fn update_key(&self, token: &str, thing_id: Uuid, key: String) -> MeshResult<Thing> {
        let user_id = self.identify(token).await?;
        if key.is_empty() {
            return Err(ValidationError::MissingKey.into());
        }
        self.authorize_thing(&user_id, thing_id, Role::Editor)
            .await?;

        let thing = self.store.things().update_key(thing_id, key).await?;
        info!(%thing_id, updated_by = %user_id, "Thing key updated");
        Ok(thing)
    }

    /// Things in every group visible to the caller.
    pub async fn list_things(&self, token: &str, pm: PageMetadata) -> MeshResult<Page<Thing>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;

        let scope = self.visible_groups_scope(&user_id).await?;
        self.store.things().list(&scope, &query).await
    }

    pub async fn list_things_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        pm: PageMetadata,
    ) -> MeshResult<Page<Thing>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        self.resolver
            .authorize_group(&user_id, group_id, Role::Viewer)
            .await?;

        self.store
            .things()
            .list(&ListScope::Within(vec![group_id]), &query)
            .await
    }

    /// Remove things and their connections in one transaction. Requires
    /// Editor on the group of every thing.
    pub async fn remove_things(&self, token: &str, thing_ids: Vec<Uuid>) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&thing_ids)?;
        let ids = distinct(thing_ids);

        let things = self.store.things().list_by_ids(&ids).await?;
        let found: HashSet<Uuid> = things.iter().map(|t| t.id).collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(*id)) {
            return Err(Error::not_found("thing", missing));
        }
        self.resolver
            .authorize_groups(&user_id, things.iter().map(|t| t.group_id), Role::Editor)
            .await?;

        self.store.things().delete_batch(&ids).await?;
        info!(count = ids.len(), removed_by = %user_id, "Things removed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    /// Create profiles in one transaction. Requires Editor on the group.
    pub async fn create_profiles(
        &self,
        token: &str,
        group_id: Uuid,
        profiles: Vec<CreateProfile>,
    ) -> MeshResult<Vec<Profile>> {
        let user_id = self.identify(token).await?;
        non_empty(&profiles)?;
        for profile in &profiles {
            check_name(&profile.name)?;
        }
        self.resolver
            .authorize_group(&user_id, group_id, Role::Editor)
            .await?;

        let mut batch = Vec::with_capacity(profiles.len());
        for input in profiles {
            let id = match input.id {
                Some(id) => id,
                None => self.new_id()?,
            };
            batch.push(Profile {
                id,
                group_id,
                name: input.name,
                config: check_config(input.config)?,
                metadata: check_metadata(input.metadata)?,
            });
        }

        let created = self.store.profiles().create_batch(batch).await?;
        info!(%group_id, count = created.len(), created_by = %user_id, "Profiles created");
        Ok(created)
    }

    /// Fetch a profile, then check `required` on its group.
    pub(crate) async fn authorize_profile(
        &self,
        user_id: &str,
        profile_id: Uuid,
        required: Role,
    ) -> MeshResult<Profile> {
        let profile = self.store.profiles().get_by_id(profile_id).await?;
        self.resolver
            .authorize_group(user_id, profile.group_id, required)
            .await?;
        Ok(profile)
    }

    pub async fn view_profile(&self, token: &str, profile_id: Uuid) -> MeshResult<Profile> {
        let user_id = self.identify(token).await?;
        self.authorize_profile(&user_id, profile_id, Role::Viewer)
            .await
    }

    pub async fn update_profile(
        &self,
        token: &str,
        profile_id: Uuid,
        input: UpdateProfile,
    ) -> MeshResult<Profile> {
        let user_id = self.identify(token).await?;
        if let Some(name) = &input.name {
            check_name(name)?;
        }
        let input = UpdateProfile {
            config: input.config.map(|c| check_config(Some(c))).transpose()?,
            metadata: input.metadata.map(|m| check_metadata(Some(m))).transpose()?,
            ..input
        };
        self.authorize_profile(&user_id, profile_id, Role::Editor)
            .await?;

        let profile = self.store.profiles().update(profile_id, input).await?;
        info!(%profile_id, updated_by = %user_id, "Profile updated");
        Ok(profile)
    }

    /// Profiles in every group visible to the caller.
    pub async fn list_profiles(&self, token: &str, pm: PageMetadata) -> MeshResult<Page<Profile>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;

        let scope = self.visible_groups_scope(&user_id).await?;
        self.store.profiles().list(&scope, &query).await
    }

    pub async fn list_profiles_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        pm: PageMetadata,
    ) -> MeshResult<Page<Profile>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        self.resolver
            .authorize_group(&user_id, group_id, Role::Viewer)
            .await?;

        self.store
            .profiles()
            .list(&ListScope::Within(vec![group_id]), &query)
            .await
    }

    /// Remove profiles and their connections in one transaction.
    /// Requires Editor on the group of every profile.
    pub async fn remove_profiles(&self, token: &str, profile_ids: Vec<Uuid>) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&profile_ids)?;
        let ids = distinct(profile_ids);

        let profiles = self.store.profiles().list_by_ids(&ids).await?;
        let found: HashSet<Uuid> = profiles.iter().map(|p| p.id).collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(*id)) {
            return Err(Error::not_found("profile", missing));
        }
        self.resolver
            .authorize_groups(&user_id, profiles.iter().map(|p| p.group_id), Role::Editor)
            .await?;

        self.store.profiles().delete_batch(&ids).await?;
        info!(count = ids.len(), removed_by = %user_id, "Profiles removed");
        Ok(())
    }
}
