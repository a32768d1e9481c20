//! SurrealDB implementation of [`GroupRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::group::{Group, UpdateGroup};
use thingmesh_core::page::{ListScope, Page, Query};
use thingmesh_core::repository::GroupRepository;
use uuid::Uuid;

use super::{
    Batch, DELETE_GROUP_SUBTREE, Filter, ListShape, fetch_page, id_strings, parse_uuid, timestamp,
};
use crate::error::{DbError, check_statements};

pub(crate) const GROUP_FIELDS: &str = "meta::id(id) AS record_id, org_id, name, description, \
     metadata, created_at, updated_at";

const GROUP_LIST: ListShape = ListShape {
    table: "group",
    fields: GROUP_FIELDS,
    id_column: "record_id",
    name_column: "name",
    has_metadata: true,
};

#[derive(Debug, SurrealValue)]
pub(crate) struct GroupRow {
    record_id: String,
    org_id: String,
    name: String,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    pub(crate) fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid("group", &self.record_id)?,
            org_id: parse_uuid("group", &self.org_id)?,
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn write_group(batch: &mut Batch, verb: &str, i: usize, group: &Group) {
    batch.bind(format!("group_id_{i}"), group.id.to_string());
    batch.bind(format!("group_org_{i}"), group.org_id.to_string());
    batch.bind(format!("group_name_{i}"), group.name.clone());
    batch.bind(format!("group_desc_{i}"), group.description.clone());
    batch.bind(format!("group_meta_{i}"), group.metadata.clone());
    batch.bind(format!("group_created_{i}"), timestamp(&group.created_at));
    batch.bind(format!("group_updated_{i}"), timestamp(&group.updated_at));
    batch.push(format!(
        "{verb} type::record('group', $group_id_{i}) SET \
         org_id = $group_org_{i}, name = $group_name_{i}, \
         description = $group_desc_{i}, metadata = $group_meta_{i}, \
         created_at = <datetime> $group_created_{i}, \
         updated_at = <datetime> $group_updated_{i}"
    ));
}

fn into_groups(rows: Vec<GroupRow>) -> MeshResult<Vec<Group>> {
    rows.into_iter()
        .map(|row| row.try_into_group().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(&self, filter: &str, ids: Vec<String>) -> MeshResult<Vec<Group>> {
        let mut result = self
            .db
            .query(format!("SELECT {GROUP_FIELDS} FROM group {filter}"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        into_groups(rows)
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create_batch(&self, groups: Vec<Group>) -> MeshResult<Vec<Group>> {
        let mut batch = Batch::new();

        let orgs: BTreeSet<Uuid> = groups.iter().map(|g| g.org_id).collect();
        for (i, org_id) in orgs.iter().enumerate() {
            let param = format!("parent_{i}");
            batch.bind(param.clone(), org_id.to_string());
            batch.require("org", &param);
        }
        for (i, group) in groups.iter().enumerate() {
            write_group(&mut batch, "CREATE", i, group);
        }

        batch.execute(&self.db, "group").await?;
        Ok(groups)
    }

    async fn get_by_id(&self, id: Uuid) -> MeshResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!("SELECT {GROUP_FIELDS} FROM type::record('group', $id)"))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.try_into_group()?)
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> MeshResult<Group> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group', $id) SET {}; \
             SELECT {GROUP_FIELDS} FROM type::record('group', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        // A rename onto an existing name in the org violates the unique index.
        check_statements("group", result.take_errors())?;

        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.try_into_group()?)
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> MeshResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        batch.bind("group_ids", id_strings(ids));
        batch.push(DELETE_GROUP_SUBTREE);
        batch.execute(&self.db, "group").await?;
        Ok(())
    }

    async fn list(&self, scope: &ListScope, query: &Query) -> MeshResult<Page<Group>> {
        let mut filter = Filter::new();
        filter.scope(scope, "org_id");
        let (total, rows) = fetch_page::<_, GroupRow>(&self.db, &GROUP_LIST, filter, query).await?;
        Ok(query.page(into_groups(rows)?, total))
    }

    async fn ids_by_orgs(&self, org_ids: &[Uuid]) -> MeshResult<Vec<Uuid>> {
        if org_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM group WHERE org_id IN $ids")
            .bind(("ids", id_strings(org_ids)))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids
            .iter()
            .map(|id| parse_uuid("group", id))
            .collect::<Result<_, _>>()?)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> MeshResult<Vec<Group>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("WHERE meta::id(id) IN $ids", id_strings(ids))
            .await
    }
}
