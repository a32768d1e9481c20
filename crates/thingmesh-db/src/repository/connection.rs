//! SurrealDB implementation of [`ConnectionRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection as SurrealConnection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::connection::Connection;
use thingmesh_core::repository::ConnectionRepository;
use uuid::Uuid;

use super::{Batch, id_strings, parse_uuid, timestamp};
use crate::error::DbError;

pub(crate) const CONNECTION_FIELDS: &str = "thing_id, profile_id, group_id, created_at";

#[derive(Debug, SurrealValue)]
pub(crate) struct ConnectionRow {
    thing_id: String,
    profile_id: String,
    group_id: String,
    created_at: DateTime<Utc>,
}

impl ConnectionRow {
    pub(crate) fn try_into_connection(self) -> Result<Connection, DbError> {
        Ok(Connection {
            thing_id: parse_uuid("connection", &self.thing_id)?,
            profile_id: parse_uuid("connection", &self.profile_id)?,
            group_id: parse_uuid("connection", &self.group_id)?,
            created_at: self.created_at,
        })
    }
}

/// Insert a junction row; with `replace` any existing row for the same
/// pair is dropped first.
pub(crate) fn write_connection(batch: &mut Batch, i: usize, conn: &Connection, replace: bool) {
    batch.bind(format!("c_thing_{i}"), conn.thing_id.to_string());
    batch.bind(format!("c_profile_{i}"), conn.profile_id.to_string());
    batch.bind(format!("c_group_{i}"), conn.group_id.to_string());
    batch.bind(format!("c_created_{i}"), timestamp(&conn.created_at));
    if replace {
        batch.push(format!(
            "DELETE connection WHERE thing_id = $c_thing_{i} AND profile_id = $c_profile_{i}"
        ));
    }
    batch.push(format!(
        "CREATE connection SET thing_id = $c_thing_{i}, profile_id = $c_profile_{i}, \
         group_id = $c_group_{i}, created_at = <datetime> $c_created_{i}"
    ));
}

fn into_connections(rows: Vec<ConnectionRow>) -> MeshResult<Vec<Connection>> {
    rows.into_iter()
        .map(|row| row.try_into_connection().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Connection repository.
#[derive(Clone)]
pub struct SurrealConnectionRepository<C: SurrealConnection> {
    db: Surreal<C>,
}

impl<C: SurrealConnection> SurrealConnectionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: SurrealConnection> ConnectionRepository for SurrealConnectionRepository<C> {
    async fn connect(&self, connections: Vec<Connection>) -> MeshResult<()> {
        let mut batch = Batch::new();

        let things: BTreeSet<Uuid> = connections.iter().map(|c| c.thing_id).collect();
        for (i, thing_id) in things.iter().enumerate() {
            let param = format!("thing_{i}");
            batch.bind(param.clone(), thing_id.to_string());
            batch.require("thing", &param);
        }
        let profiles: BTreeSet<Uuid> = connections.iter().map(|c| c.profile_id).collect();
        for (i, profile_id) in profiles.iter().enumerate() {
            let param = format!("profile_{i}");
            batch.bind(param.clone(), profile_id.to_string());
            batch.require("profile", &param);
        }
        for (i, conn) in connections.iter().enumerate() {
            write_connection(&mut batch, i, conn, false);
        }

        batch.execute(&self.db, "connection").await?;
        Ok(())
    }

    async fn disconnect(&self, profile_id: Uuid, thing_ids: &[Uuid]) -> MeshResult<()> {
        if thing_ids.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        batch.bind("profile_id", profile_id.to_string());
        batch.bind("thing_ids", id_strings(thing_ids));
        batch.push(
            "FOR $thing_id IN $thing_ids { \
             DELETE connection WHERE thing_id = $thing_id AND profile_id = $profile_id; }",
        );
        batch.execute(&self.db, "connection").await?;
        Ok(())
    }

    async fn list_by_profile(&self, profile_id: Uuid) -> MeshResult<Vec<Connection>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {CONNECTION_FIELDS} FROM connection WHERE profile_id = $profile_id \
                 ORDER BY created_at ASC"
            ))
            .bind(("profile_id", profile_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConnectionRow> = result.take(0).map_err(DbError::from)?;
        into_connections(rows)
    }

    async fn list_by_thing(&self, thing_id: Uuid) -> MeshResult<Vec<Connection>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {CONNECTION_FIELDS} FROM connection WHERE thing_id = $thing_id \
                 ORDER BY created_at ASC"
            ))
            .bind(("thing_id", thing_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConnectionRow> = result.take(0).map_err(DbError::from)?;
        into_connections(rows)
    }
}
