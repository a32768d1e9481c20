//! Thing-to-profile connection graph.

use std::collections::HashSet;

use chrono::Utc;
use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult};
use thingmesh_core::models::connection::Connection;
use thingmesh_core::models::profile::Profile;
use thingmesh_core::models::thing::Thing;
use thingmesh_core::page::{ListScope, Page, PageMetadata};
use thingmesh_core::repository::{ConnectionRepository, ProfileRepository, Store, ThingRepository};
use thingmesh_core::Role;
use tracing::{info, warn};
use uuid::Uuid;

use crate::service::{ThingsService, distinct, non_empty};

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    /// Connect things to a profile in one transaction. Requires Editor
    /// on the profile's group, and every thing must belong to that
    /// group; otherwise nothing is connected.
    pub async fn connect(
        &self,
        token: &str,
        profile_id: Uuid,
        thing_ids: Vec<Uuid>,
    ) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&thing_ids)?;
        let thing_ids = distinct(thing_ids);
        let profile = self
            .authorize_profile(&user_id, profile_id, Role::Editor)
            .await?;

        let things = self.store.things().list_by_ids(&thing_ids).await?;
        let found: HashSet<Uuid> = things.iter().map(|t| t.id).collect();
        if let Some(missing) = thing_ids.iter().find(|id| !found.contains(*id)) {
            return Err(Error::not_found("thing", missing));
        }
        if let Some(foreign) = things.iter().find(|t| t.group_id != profile.group_id) {
            warn!(
                %user_id,
                %profile_id,
                thing_id = %foreign.id,
                "Cross-group connection refused"
            );
            return Err(Error::denied("thing and profile belong to different groups"));
        }

        let now = Utc::now();
        let connections = thing_ids
            .iter()
            .map(|&thing_id| Connection {
                thing_id,
                profile_id,
                group_id: profile.group_id,
                created_at: now,
            })
            .collect();
        self.store.connections().connect(connections).await?;

        info!(%profile_id, count = thing_ids.len(), connected_by = %user_id, "Things connected");
        Ok(())
    }

    /// Remove connections in one transaction. Every pair must be
    /// connected.
    pub async fn disconnect(
        &self,
        token: &str,
        profile_id: Uuid,
        thing_ids: Vec<Uuid>,
    ) -> MeshResult<()> {
        let user_id = self.identify(token).await?;
        non_empty(&thing_ids)?;
        let thing_ids = distinct(thing_ids);
        self.authorize_profile(&user_id, profile_id, Role::Editor)
            .await?;

        let connected: HashSet<Uuid> = self
            .store
            .connections()
            .list_by_profile(profile_id)
            .await?
            .into_iter()
            .map(|c| c.thing_id)
            .collect();
        if let Some(missing) = thing_ids.iter().find(|id| !connected.contains(*id)) {
            return Err(Error::not_found("connection", missing));
        }

        self.store
            .connections()
            .disconnect(profile_id, &thing_ids)
            .await?;
        info!(%profile_id, count = thing_ids.len(), disconnected_by = %user_id, "Things disconnected");
        Ok(())
    }

    /// Device-facing lookup by thing key, without a caller token.
    /// Returns `(profile_id, thing_id)` of the thing's oldest
    /// connection. No thing has an empty key.
    pub async fn get_connection_by_thing_key(&self, key: &str) -> MeshResult<(Uuid, Uuid)> {
        if key.is_empty() {
            return Err(Error::not_found("thing", "<key>"));
        }
        let thing = self.store.things().get_by_key(key).await?;
        let oldest = self
            .store
            .connections()
            .list_by_thing(thing.id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("connection", thing.id))?;
        Ok((oldest.profile_id, thing.id))
    }

    /// Things connected to a profile. Requires Viewer on its group.
    pub async fn list_things_by_profile(
        &self,
        token: &str,
        profile_id: Uuid,
        pm: PageMetadata,
    ) -> MeshResult<Page<Thing>> {
        let user_id = self.identify(token).await?;
        let query = self.query(&pm)?;
        self.authorize_profile(&user_id, profile_id, Role::Viewer)
            .await?;

        let thing_ids: Vec<Uuid> = self
            .store
            .connections()
            .list_by_profile(profile_id)
            .await?
            .into_iter()
            .map(|c| c.thing_id)
            .collect();
        self.store
            .things()
            .list(&ListScope::Ids(thing_ids), &query)
            .await
    }

    /// The profile a thing is (first) connected to. Requires Viewer on
    /// the thing's group.
    pub async fn view_profile_by_thing(&self, token: &str, thing_id: Uuid) -> MeshResult<Profile> {
        let user_id = self.identify(token).await?;
        self.authorize_thing(&user_id, thing_id, Role::Viewer)
            .await?;

        let oldest = self
            .store
            .connections()
            .list_by_thing(thing_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("connection", thing_id))?;
        self.store.profiles().get_by_id(oldest.profile_id).await
    }
}
