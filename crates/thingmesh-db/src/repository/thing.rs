//! SurrealDB implementation of [`ThingRepository`].

use std::collections::BTreeSet;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::thing::{Thing, UpdateThing};
use thingmesh_core::page::{ListScope, Page, Query};
use thingmesh_core::repository::ThingRepository;
use uuid::Uuid;

use super::{Batch, Filter, ListShape, fetch_page, id_strings, parse_uuid};
use crate::error::{DbError, check_statements};

pub(crate) const THING_FIELDS: &str = "meta::id(id) AS record_id, group_id, name, key, metadata";

const THING_LIST: ListShape = ListShape {
    table: "thing",
    fields: THING_FIELDS,
    id_column: "record_id",
    name_column: "name",
    has_metadata: true,
};

#[derive(Debug, SurrealValue)]
pub(crate) struct ThingRow {
    record_id: String,
    group_id: String,
    name: String,
    key: String,
    metadata: serde_json::Value,
}

impl ThingRow {
    pub(crate) fn try_into_thing(self) -> Result<Thing, DbError> {
        Ok(Thing {
            id: parse_uuid("thing", &self.record_id)?,
            group_id: parse_uuid("thing", &self.group_id)?,
            name: self.name,
            key: self.key,
            metadata: self.metadata,
        })
    }
}

pub(crate) fn write_thing(batch: &mut Batch, verb: &str, i: usize, thing: &Thing) {
    batch.bind(format!("thing_id_{i}"), thing.id.to_string());
    batch.bind(format!("thing_group_{i}"), thing.group_id.to_string());
    batch.bind(format!("thing_name_{i}"), thing.name.clone());
    batch.bind(format!("thing_key_{i}"), thing.key.clone());
    batch.bind(format!("thing_meta_{i}"), thing.metadata.clone());
    batch.push(format!(
        "{verb} type::record('thing', $thing_id_{i}) SET \
         group_id = $thing_group_{i}, name = $thing_name_{i}, \
         key = $thing_key_{i}, metadata = $thing_meta_{i}"
    ));
}

fn into_things(rows: Vec<ThingRow>) -> MeshResult<Vec<Thing>> {
    rows.into_iter()
        .map(|row| row.try_into_thing().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Thing repository.
#[derive(Clone)]
pub struct SurrealThingRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealThingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(&self, filter: &str, ids: Vec<String>) -> MeshResult<Vec<Thing>> {
        let mut result = self
            .db
            .query(format!("SELECT {THING_FIELDS} FROM thing {filter}"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ThingRow> = result.take(0).map_err(DbError::from)?;
        into_things(rows)
    }

    /// `label` names the record in a `NotFound` error; keys never do.
    async fn select_one(
        &self,
        source: &str,
        param: &str,
        value: String,
        label: String,
    ) -> MeshResult<Thing> {
        let mut result = self
            .db
            .query(format!("SELECT {THING_FIELDS} FROM {source}"))
            .bind((param.to_string(), value))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ThingRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "thing".into(),
            id: label,
        })?;

        Ok(row.try_into_thing()?)
    }
}

impl<C: Connection> ThingRepository for SurrealThingRepository<C> {
    async fn create_batch(&self, things: Vec<Thing>) -> MeshResult<Vec<Thing>> {
        let mut batch = Batch::new();

        let groups: BTreeSet<Uuid> = things.iter().map(|t| t.group_id).collect();
        for (i, group_id) in groups.iter().enumerate() {
            let param = format!("parent_{i}");
            batch.bind(param.clone(), group_id.to_string());
            batch.require("group", &param);
        }
        for (i, thing) in things.iter().enumerate() {
            write_thing(&mut batch, "CREATE", i, thing);
        }

        batch.execute(&self.db, "thing").await?;
        Ok(things)
    }

    async fn get_by_id(&self, id: Uuid) -> MeshResult<Thing> {
        let id_str = id.to_string();
        self.select_one("type::record('thing', $id)", "id", id_str.clone(), id_str)
            .await
    }

    async fn get_by_key(&self, key: &str) -> MeshResult<Thing> {
        self.select_one("thing WHERE key = $key", "key", key.to_string(), "<key>".into())
            .await
    }

    async fn update(&self, id: Uuid, input: UpdateThing) -> MeshResult<Thing> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('thing', $id) SET {}; \
             SELECT {THING_FIELDS} FROM type::record('thing', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        check_statements("thing", result.take_errors())?;

        let rows: Vec<ThingRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "thing".into(),
            id: id_str,
        })?;

        Ok(row.try_into_thing()?)
    }

    async fn update_key(&self, id: Uuid, key: String) -> MeshResult<Thing> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "UPDATE type::record('thing', $id) SET key = $key; \
                 SELECT {THING_FIELDS} FROM type::record('thing', $id);"
            ))
            .bind(("id", id_str.clone()))
            .bind(("key", key))
            .await
            .map_err(DbError::from)?;
        // The unique key index rejects the write and leaves the old key.
        check_statements("thing", result.take_errors())?;

        let rows: Vec<ThingRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "thing".into(),
            id: id_str,
        })?;

        Ok(row.try_into_thing()?)
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> MeshResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        batch.bind("thing_ids", id_strings(ids));
        batch.push(
            "FOR $thing_id IN $thing_ids { \
             DELETE connection WHERE thing_id = $thing_id; \
             DELETE type::record('thing', $thing_id); }",
        );
        batch.execute(&self.db, "thing").await?;
        Ok(())
    }

    async fn list(&self, scope: &ListScope, query: &Query) -> MeshResult<Page<Thing>> {
        let mut filter = Filter::new();
        filter.scope(scope, "group_id");
        let (total, rows) = fetch_page::<_, ThingRow>(&self.db, &THING_LIST, filter, query).await?;
        Ok(query.page(into_things(rows)?, total))
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> MeshResult<Vec<Thing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("WHERE meta::id(id) IN $ids", id_strings(ids))
            .await
    }
}
