//! SurrealDB implementation of [`ProfileRepository`].

use std::collections::BTreeSet;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::profile::{Profile, UpdateProfile};
use thingmesh_core::page::{ListScope, Page, Query};
use thingmesh_core::repository::ProfileRepository;
use uuid::Uuid;

use super::{Batch, Filter, ListShape, fetch_page, id_strings, parse_uuid};
use crate::error::{DbError, check_statements};

pub(crate) const PROFILE_FIELDS: &str =
    "meta::id(id) AS record_id, group_id, name, config, metadata";

const PROFILE_LIST: ListShape = ListShape {
    table: "profile",
    fields: PROFILE_FIELDS,
    id_column: "record_id",
    name_column: "name",
    has_metadata: true,
};

#[derive(Debug, SurrealValue)]
pub(crate) struct ProfileRow {
    record_id: String,
    group_id: String,
    name: String,
    config: serde_json::Value,
    metadata: serde_json::Value,
}

impl ProfileRow {
    pub(crate) fn try_into_profile(self) -> Result<Profile, DbError> {
        Ok(Profile {
            id: parse_uuid("profile", &self.record_id)?,
            group_id: parse_uuid("profile", &self.group_id)?,
            name: self.name,
            config: self.config,
            metadata: self.metadata,
        })
    }
}

pub(crate) fn write_profile(batch: &mut Batch, verb: &str, i: usize, profile: &Profile) {
    batch.bind(format!("profile_id_{i}"), profile.id.to_string());
    batch.bind(format!("profile_group_{i}"), profile.group_id.to_string());
    batch.bind(format!("profile_name_{i}"), profile.name.clone());
    batch.bind(format!("profile_config_{i}"), profile.config.clone());
    batch.bind(format!("profile_meta_{i}"), profile.metadata.clone());
    batch.push(format!(
        "{verb} type::record('profile', $profile_id_{i}) SET \
         group_id = $profile_group_{i}, name = $profile_name_{i}, \
         config = $profile_config_{i}, metadata = $profile_meta_{i}"
    ));
}

fn into_profiles(rows: Vec<ProfileRow>) -> MeshResult<Vec<Profile>> {
    rows.into_iter()
        .map(|row| row.try_into_profile().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Profile repository.
#[derive(Clone)]
pub struct SurrealProfileRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProfileRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(&self, filter: &str, ids: Vec<String>) -> MeshResult<Vec<Profile>> {
        let mut result = self
            .db
            .query(format!("SELECT {PROFILE_FIELDS} FROM profile {filter}"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ProfileRow> = result.take(0).map_err(DbError::from)?;
        into_profiles(rows)
    }
}

impl<C: Connection> ProfileRepository for SurrealProfileRepository<C> {
    async fn create_batch(&self, profiles: Vec<Profile>) -> MeshResult<Vec<Profile>> {
        let mut batch = Batch::new();

        let groups: BTreeSet<Uuid> = profiles.iter().map(|p| p.group_id).collect();
        for (i, group_id) in groups.iter().enumerate() {
            let param = format!("parent_{i}");
            batch.bind(param.clone(), group_id.to_string());
            batch.require("group", &param);
        }
        for (i, profile) in profiles.iter().enumerate() {
            write_profile(&mut batch, "CREATE", i, profile);
        }

        batch.execute(&self.db, "profile").await?;
        Ok(profiles)
    }

    async fn get_by_id(&self, id: Uuid) -> MeshResult<Profile> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT {PROFILE_FIELDS} FROM type::record('profile', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "profile".into(),
            id: id_str,
        })?;

        Ok(row.try_into_profile()?)
    }

    async fn update(&self, id: Uuid, input: UpdateProfile) -> MeshResult<Profile> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.config.is_some() {
            sets.push("config = $config");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('profile', $id) SET {}; \
             SELECT {PROFILE_FIELDS} FROM type::record('profile', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(config) = input.config {
            builder = builder.bind(("config", config));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        check_statements("profile", result.take_errors())?;

        let rows: Vec<ProfileRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "profile".into(),
            id: id_str,
        })?;

        Ok(row.try_into_profile()?)
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> MeshResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        batch.bind("profile_ids", id_strings(ids));
        batch.push(
            "FOR $profile_id IN $profile_ids { \
             DELETE connection WHERE profile_id = $profile_id; \
             DELETE type::record('profile', $profile_id); }",
        );
        batch.execute(&self.db, "profile").await?;
        Ok(())
    }

    async fn list(&self, scope: &ListScope, query: &Query) -> MeshResult<Page<Profile>> {
        let mut filter = Filter::new();
        filter.scope(scope, "group_id");
        let (total, rows) =
            fetch_page::<_, ProfileRow>(&self.db, &PROFILE_LIST, filter, query).await?;
        Ok(query.page(into_profiles(rows)?, total))
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> MeshResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("WHERE meta::id(id) IN $ids", id_strings(ids))
            .await
    }
}
