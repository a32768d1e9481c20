//! SurrealDB implementation of [`OrgRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::org::{Org, UpdateOrg};
use thingmesh_core::page::{ListScope, Page, Query};
use thingmesh_core::repository::OrgRepository;
use uuid::Uuid;

use super::{
    Batch, DELETE_GROUP_SUBTREE, Filter, ListShape, fetch_page, id_strings, parse_uuid, timestamp,
};
use crate::error::{DbError, check_statements};

pub(crate) const ORG_FIELDS: &str = "meta::id(id) AS record_id, owner_id, name, description, \
     metadata, created_at, updated_at";

const ORG_LIST: ListShape = ListShape {
    table: "org",
    fields: ORG_FIELDS,
    id_column: "record_id",
    name_column: "name",
    has_metadata: true,
};

#[derive(Debug, SurrealValue)]
pub(crate) struct OrgRow {
    record_id: String,
    owner_id: String,
    name: String,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrgRow {
    pub(crate) fn try_into_org(self) -> Result<Org, DbError> {
        Ok(Org {
            id: parse_uuid("org", &self.record_id)?,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Add an upsert (or create) of `org` to a batch under parameter suffix `i`.
pub(crate) fn write_org(batch: &mut Batch, verb: &str, i: usize, org: &Org) {
    batch.bind(format!("org_id_{i}"), org.id.to_string());
    batch.bind(format!("org_owner_{i}"), org.owner_id.clone());
    batch.bind(format!("org_name_{i}"), org.name.clone());
    batch.bind(format!("org_desc_{i}"), org.description.clone());
    batch.bind(format!("org_meta_{i}"), org.metadata.clone());
    batch.bind(format!("org_created_{i}"), timestamp(&org.created_at));
    batch.bind(format!("org_updated_{i}"), timestamp(&org.updated_at));
    batch.push(format!(
        "{verb} type::record('org', $org_id_{i}) SET \
         owner_id = $org_owner_{i}, name = $org_name_{i}, \
         description = $org_desc_{i}, metadata = $org_meta_{i}, \
         created_at = <datetime> $org_created_{i}, \
         updated_at = <datetime> $org_updated_{i}"
    ));
}

fn into_orgs(rows: Vec<OrgRow>) -> MeshResult<Vec<Org>> {
    rows.into_iter()
        .map(|row| row.try_into_org().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Org repository.
#[derive(Clone)]
pub struct SurrealOrgRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrgRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrgRepository for SurrealOrgRepository<C> {
    async fn create(&self, org: Org) -> MeshResult<Org> {
        let mut batch = Batch::new();
        write_org(&mut batch, "CREATE", 0, &org);
        batch.execute(&self.db, "org").await?;
        Ok(org)
    }

    async fn get_by_id(&self, id: Uuid) -> MeshResult<Org> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT {ORG_FIELDS} FROM type::record('org', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrgRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "org".into(),
            id: id_str,
        })?;

        Ok(row.try_into_org()?)
    }

    async fn update(&self, id: Uuid, input: UpdateOrg) -> MeshResult<Org> {
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
            "UPDATE type::record('org', $id) SET {}; \
             SELECT {ORG_FIELDS} FROM type::record('org', $id);",
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
        check_statements("org", result.take_errors())?;

        let rows: Vec<OrgRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "org".into(),
            id: id_str,
        })?;

        Ok(row.try_into_org()?)
    }

    async fn delete(&self, id: Uuid) -> MeshResult<()> {
        let mut batch = Batch::new();
        batch.bind("org_id", id.to_string());
        batch.push("LET $group_ids = (SELECT VALUE meta::id(id) FROM group WHERE org_id = $org_id)");
        batch.push(DELETE_GROUP_SUBTREE);
        batch.push("DELETE type::record('org', $org_id)");
        batch.execute(&self.db, "org").await?;
        Ok(())
    }

    async fn list(&self, ids: Option<&[Uuid]>, query: &Query) -> MeshResult<Page<Org>> {
        let mut filter = Filter::new();
        if let Some(ids) = ids {
            filter.scope(&ListScope::Ids(ids.to_vec()), "meta::id(id)");
        }
        let (total, rows) = fetch_page::<_, OrgRow>(&self.db, &ORG_LIST, filter, query).await?;
        Ok(query.page(into_orgs(rows)?, total))
    }

    async fn ids_by_owner(&self, owner_id: &str) -> MeshResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM org WHERE owner_id = $owner_id")
            .bind(("owner_id", owner_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids
            .iter()
            .map(|id| parse_uuid("org", id))
            .collect::<Result<_, _>>()?)
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> MeshResult<Vec<Org>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = self
            .db
            .query(format!("SELECT {ORG_FIELDS} FROM org WHERE meta::id(id) IN $ids"))
            .bind(("ids", id_strings(ids)))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<OrgRow> = result.take(0).map_err(DbError::from)?;
        into_orgs(rows)
    }
}
