//! SurrealDB implementation of [`SnapshotRepository`].

use surrealdb::{Connection, Surreal};
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::snapshot::Snapshot;
use thingmesh_core::repository::SnapshotRepository;
use tracing::debug;
use uuid::Uuid;

use super::connection::{CONNECTION_FIELDS, ConnectionRow, write_connection};
use super::group::{GROUP_FIELDS, GroupRow, write_group};
use super::membership::{MEMBERSHIP_FIELDS, MembershipRow, write_membership};
use super::org::{ORG_FIELDS, OrgRow, write_org};
use super::profile::{PROFILE_FIELDS, ProfileRow, write_profile};
use super::thing::{THING_FIELDS, ThingRow, write_thing};
use super::{Batch, id_strings};
use crate::error::{DbError, check_statements};

/// Groups reachable from `$org_ids`, as raw ID strings.
const SCOPED_GROUPS: &str = "(SELECT VALUE meta::id(id) FROM group WHERE org_id IN $org_ids)";

/// SurrealDB implementation of the Snapshot repository.
#[derive(Clone)]
pub struct SurrealSnapshotRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSnapshotRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn collect<R, T>(rows: Vec<R>, convert: fn(R) -> Result<T, DbError>) -> Result<Vec<T>, DbError> {
    rows.into_iter().map(convert).collect()
}

impl<C: Connection> SnapshotRepository for SurrealSnapshotRepository<C> {
    async fn export(&self, org_ids: Option<Vec<Uuid>>) -> MeshResult<Snapshot> {
        let all = org_ids.is_none();
        let org_ids = org_ids.as_deref().map(id_strings).unwrap_or_default();

        // BEGIN and COMMIT take response slots 0 and 7.
        let query = format!(
            "BEGIN TRANSACTION;\n\
             SELECT {ORG_FIELDS} FROM org WHERE $all OR meta::id(id) IN $org_ids \
               ORDER BY record_id;\n\
             SELECT {GROUP_FIELDS} FROM group WHERE $all OR org_id IN $org_ids \
               ORDER BY record_id;\n\
             SELECT {THING_FIELDS} FROM thing WHERE $all OR group_id IN {SCOPED_GROUPS} \
               ORDER BY record_id;\n\
             SELECT {PROFILE_FIELDS} FROM profile WHERE $all OR group_id IN {SCOPED_GROUPS} \
               ORDER BY record_id;\n\
             SELECT {CONNECTION_FIELDS} FROM connection WHERE $all OR group_id IN {SCOPED_GROUPS} \
               ORDER BY thing_id, profile_id;\n\
             SELECT {MEMBERSHIP_FIELDS} FROM membership WHERE $all OR group_id IN {SCOPED_GROUPS} \
               ORDER BY group_id, member_id;\n\
             COMMIT TRANSACTION;"
        );

        let mut result = self
            .db
            .query(query)
            .bind(("all", all))
            .bind(("org_ids", org_ids))
            .await
            .map_err(DbError::from)?;
        check_statements("snapshot", result.take_errors())?;

        let orgs: Vec<OrgRow> = result.take(1).map_err(DbError::from)?;
        let groups: Vec<GroupRow> = result.take(2).map_err(DbError::from)?;
        let things: Vec<ThingRow> = result.take(3).map_err(DbError::from)?;
        let profiles: Vec<ProfileRow> = result.take(4).map_err(DbError::from)?;
        let connections: Vec<ConnectionRow> = result.take(5).map_err(DbError::from)?;
        let memberships: Vec<MembershipRow> = result.take(6).map_err(DbError::from)?;

        let snapshot = Snapshot {
            orgs: collect(orgs, OrgRow::try_into_org)?,
            groups: collect(groups, GroupRow::try_into_group)?,
            things: collect(things, ThingRow::try_into_thing)?,
            profiles: collect(profiles, ProfileRow::try_into_profile)?,
            connections: collect(connections, ConnectionRow::try_into_connection)?,
            memberships: collect(memberships, MembershipRow::try_into_membership)?,
        };

        debug!(
            orgs = snapshot.orgs.len(),
            groups = snapshot.groups.len(),
            things = snapshot.things.len(),
            "Snapshot exported"
        );
        Ok(snapshot)
    }

    async fn import(&self, snapshot: Snapshot) -> MeshResult<()> {
        let mut batch = Batch::new();

        // Parents before children so every reference resolves inside the
        // transaction.
        for (i, org) in snapshot.orgs.iter().enumerate() {
            write_org(&mut batch, "UPSERT", i, org);
        }
        for (i, group) in snapshot.groups.iter().enumerate() {
            write_group(&mut batch, "UPSERT", i, group);
        }
        for (i, thing) in snapshot.things.iter().enumerate() {
            write_thing(&mut batch, "UPSERT", i, thing);
        }
        for (i, profile) in snapshot.profiles.iter().enumerate() {
            write_profile(&mut batch, "UPSERT", i, profile);
        }
        for (i, membership) in snapshot.memberships.iter().enumerate() {
            write_membership(&mut batch, i, membership, true);
        }
        for (i, conn) in snapshot.connections.iter().enumerate() {
            write_connection(&mut batch, i, conn, true);
        }

        batch.execute(&self.db, "snapshot").await?;
        Ok(())
    }
}
