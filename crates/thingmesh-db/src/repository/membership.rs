//! SurrealDB implementation of [`MembershipRepository`].

use std::collections::BTreeSet;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::Role;
use thingmesh_core::error::MeshResult;
use thingmesh_core::models::membership::Membership;
use thingmesh_core::page::{Page, Query};
use thingmesh_core::repository::MembershipRepository;
use uuid::Uuid;

use super::{Batch, Filter, ListShape, fetch_page, parse_uuid};
use crate::error::DbError;

pub(crate) const MEMBERSHIP_FIELDS: &str = "group_id, member_id, role";

/// Memberships have neither a name nor metadata; both orderings sort by
/// member ID and the name filter matches it.
const MEMBERSHIP_LIST: ListShape = ListShape {
    table: "membership",
    fields: MEMBERSHIP_FIELDS,
    id_column: "member_id",
    name_column: "member_id",
    has_metadata: false,
};

#[derive(Debug, SurrealValue)]
pub(crate) struct MembershipRow {
    group_id: String,
    member_id: String,
    role: String,
}

impl MembershipRow {
    pub(crate) fn try_into_membership(self) -> Result<Membership, DbError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| DbError::corrupt("membership", format!("unknown role: {}", self.role)))?;
        Ok(Membership {
            group_id: parse_uuid("membership", &self.group_id)?,
            member_id: self.member_id,
            role,
        })
    }
}

/// Replace-or-insert of a membership row keyed by `(group, member)`.
pub(crate) fn write_membership(batch: &mut Batch, i: usize, m: &Membership, replace: bool) {
    batch.bind(format!("m_group_{i}"), m.group_id.to_string());
    batch.bind(format!("m_member_{i}"), m.member_id.clone());
    batch.bind(format!("m_role_{i}"), m.role.as_str());
    if replace {
        batch.push(format!(
            "DELETE membership WHERE group_id = $m_group_{i} AND member_id = $m_member_{i}"
        ));
    }
    batch.push(format!(
        "CREATE membership SET group_id = $m_group_{i}, \
         member_id = $m_member_{i}, role = $m_role_{i}"
    ));
}

fn into_memberships(rows: Vec<MembershipRow>) -> MeshResult<Vec<Membership>> {
    rows.into_iter()
        .map(|row| row.try_into_membership().map_err(Into::into))
        .collect()
}

/// SurrealDB implementation of the Membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create_batch(&self, memberships: Vec<Membership>) -> MeshResult<()> {
        let mut batch = Batch::new();

        let groups: BTreeSet<Uuid> = memberships.iter().map(|m| m.group_id).collect();
        for (i, group_id) in groups.iter().enumerate() {
            let param = format!("parent_{i}");
            batch.bind(param.clone(), group_id.to_string());
            batch.require("group", &param);
        }
        for (i, m) in memberships.iter().enumerate() {
            write_membership(&mut batch, i, m, false);
        }

        batch.execute(&self.db, "membership").await?;
        Ok(())
    }

    async fn update_batch(&self, memberships: Vec<Membership>) -> MeshResult<()> {
        let mut batch = Batch::new();
        for (i, m) in memberships.iter().enumerate() {
            batch.bind(format!("m_group_{i}"), m.group_id.to_string());
            batch.bind(format!("m_member_{i}"), m.member_id.clone());
            batch.bind(format!("m_role_{i}"), m.role.as_str());
            batch.push(format!(
                "UPDATE membership SET role = $m_role_{i} \
                 WHERE group_id = $m_group_{i} AND member_id = $m_member_{i}"
            ));
        }
        batch.execute(&self.db, "membership").await?;
        Ok(())
    }

    async fn delete_batch(&self, group_id: Uuid, member_ids: &[String]) -> MeshResult<()> {
        let mut batch = Batch::new();
        batch.bind("group_id", group_id.to_string());
        batch.bind("member_ids", member_ids.to_vec());
        batch.push(
            "FOR $member_id IN $member_ids { \
             DELETE membership WHERE group_id = $group_id AND member_id = $member_id; }",
        );
        batch.execute(&self.db, "membership").await?;
        Ok(())
    }

    async fn find(&self, group_id: Uuid, member_id: &str) -> MeshResult<Option<Membership>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {MEMBERSHIP_FIELDS} FROM membership \
                 WHERE group_id = $group_id AND member_id = $member_id"
            ))
            .bind(("group_id", group_id.to_string()))
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_membership()?)),
            None => Ok(None),
        }
    }

    async fn list(&self, group_id: Uuid, query: &Query) -> MeshResult<Page<Membership>> {
        let mut filter = Filter::new();
        filter.equals("group_id", group_id.to_string());
        let (total, rows) =
            fetch_page::<_, MembershipRow>(&self.db, &MEMBERSHIP_LIST, filter, query).await?;
        Ok(query.page(into_memberships(rows)?, total))
    }

    async fn list_by_group(&self, group_id: Uuid) -> MeshResult<Vec<Membership>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {MEMBERSHIP_FIELDS} FROM membership WHERE group_id = $group_id"
            ))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        into_memberships(rows)
    }

    async fn list_by_member(&self, member_id: &str) -> MeshResult<Vec<Membership>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {MEMBERSHIP_FIELDS} FROM membership WHERE member_id = $member_id"
            ))
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        into_memberships(rows)
    }
}
