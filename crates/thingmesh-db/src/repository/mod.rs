//! SurrealDB repository implementations.

mod connection;
mod group;
mod membership;
mod org;
mod profile;
mod snapshot;
mod thing;

pub use connection::SurrealConnectionRepository;
pub use group::SurrealGroupRepository;
pub use membership::SurrealMembershipRepository;
pub use org::SurrealOrgRepository;
pub use profile::SurrealProfileRepository;
pub use snapshot::SurrealSnapshotRepository;
pub use thing::SurrealThingRepository;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use thingmesh_core::page::{Direction, ListScope, OrderBy, Query};
use uuid::Uuid;

use crate::error::{DbError, check_statements};

/// Deletes every row owned by the groups in `$group_ids`, junction rows
/// first, then leaves, then the groups themselves.
///
/// Deletes match one ID at a time: `DELETE ... WHERE col IN $list` skips
/// rows when `col` leads a composite index.
pub(crate) const DELETE_GROUP_SUBTREE: &str = "FOR $group_id IN $group_ids {
    DELETE connection WHERE group_id = $group_id;
    DELETE thing WHERE group_id = $group_id;
    DELETE profile WHERE group_id = $group_id;
    DELETE membership WHERE group_id = $group_id;
    DELETE type::record('group', $group_id);
}";

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Column layout of a table served by paged listings.
pub(crate) struct ListShape {
    pub(crate) table: &'static str,
    pub(crate) fields: &'static str,
    /// Projected column for `order=id` and tie-breaking.
    pub(crate) id_column: &'static str,
    pub(crate) name_column: &'static str,
    pub(crate) has_metadata: bool,
}

/// `WHERE` conditions of a paged listing and their bound parameters.
#[derive(Default)]
pub(crate) struct Filter {
    conditions: Vec<String>,
    params: Vec<(String, serde_json::Value)>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn param(&mut self, value: serde_json::Value) -> String {
        let name = format!("f_{}", self.params.len());
        self.params.push((name.clone(), value));
        name
    }

    pub(crate) fn equals(&mut self, column: &str, value: impl Into<serde_json::Value>) {
        let param = self.param(value.into());
        self.conditions.push(format!("{column} = ${param}"));
    }

    /// Restrict to `scope`; `parent_column` holds the parent ID for
    /// [`ListScope::Within`].
    pub(crate) fn scope(&mut self, scope: &ListScope, parent_column: &str) {
        let (column, ids) = match scope {
            ListScope::All => return,
            ListScope::Ids(ids) => ("meta::id(id)", ids),
            ListScope::Within(ids) => (parent_column, ids),
        };
        let param = self.param(id_strings(ids).into());
        self.conditions.push(format!("{column} IN ${param}"));
    }

    fn query(&mut self, shape: &ListShape, query: &Query) {
        if let Some(name) = query.name() {
            let param = self.param(name.into());
            self.conditions
                .push(format!("string::contains({}, ${param})", shape.name_column));
        }
        if query.metadata().is_empty() {
            return;
        }
        if !shape.has_metadata {
            self.conditions.push("false".into());
            return;
        }
        for (key, value) in query.metadata() {
            let key = self.param(key.as_str().into());
            let value = self.param(value.clone());
            self.conditions.push(format!("metadata[${key}] = ${value}"));
        }
    }

    fn clause(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = self.conditions.iter().map(|c| format!("({c})")).collect();
        format!("WHERE {}", joined.join(" AND "))
    }
}

fn order_clause(shape: &ListShape, query: &Query) -> String {
    let dir = match query.dir() {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    match query.order() {
        OrderBy::Name if shape.name_column != shape.id_column => {
            format!("ORDER BY {} {dir}, {} ASC", shape.name_column, shape.id_column)
        }
        _ => format!("ORDER BY {} {dir}", shape.id_column),
    }
}

/// Count every match and fetch one ordered window of rows.
pub(crate) async fn fetch_page<C: Connection, R: SurrealValue>(
    db: &Surreal<C>,
    shape: &ListShape,
    mut filter: Filter,
    query: &Query,
) -> Result<(u64, Vec<R>), DbError> {
    filter.query(shape, query);
    let clause = filter.clause();
    let window = match query.limit() {
        Some(_) => "LIMIT $limit START $offset",
        None => "START $offset",
    };
    let sql = format!(
        "SELECT count() AS total FROM {table} {clause} GROUP ALL;\n\
         SELECT {fields} FROM {table} {clause} {order} {window};",
        table = shape.table,
        fields = shape.fields,
        order = order_clause(shape, query),
    );

    let mut builder = db.query(sql).bind(("offset", query.offset() as u64));
    if let Some(limit) = query.limit() {
        builder = builder.bind(("limit", limit as u64));
    }
    for (name, value) in filter.params {
        builder = builder.bind((name, value));
    }

    let mut result = builder.await?;
    check_statements(shape.table, result.take_errors())?;
    let counts: Vec<CountRow> = result.take(0)?;
    let rows: Vec<R> = result.take(1)?;
    Ok((counts.first().map(|c| c.total).unwrap_or(0), rows))
}

/// Statements and parameters executed as a single transaction.
///
/// SurrealDB cancels the whole transaction when any statement fails, so
/// a `Batch` either commits every row or none.
#[derive(Default)]
pub(crate) struct Batch {
    sql: String,
    params: Vec<(String, serde_json::Value)>,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, statement: impl AsRef<str>) {
        self.sql.push_str(statement.as_ref());
        self.sql.push_str(";\n");
    }

    pub(crate) fn bind(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.params.push((name.into(), value.into()));
    }

    /// Abort the transaction unless the referenced parent record exists.
    pub(crate) fn require(&mut self, table: &str, param: &str) {
        self.push(format!(
            "IF !record::exists(type::record('{table}', ${param})) {{ THROW 'missing:{table}' }}"
        ));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub(crate) async fn execute<C: Connection>(
        self,
        db: &Surreal<C>,
        entity: &str,
    ) -> Result<(), DbError> {
        if self.is_empty() {
            return Ok(());
        }
        let sql = format!("BEGIN TRANSACTION;\n{}COMMIT TRANSACTION;", self.sql);
        let mut query = db.query(sql);
        for (name, value) in self.params {
            query = query.bind((name, value));
        }
        let mut response = query.await?;
        check_statements(entity, response.take_errors())
    }
}

pub(crate) fn parse_uuid(entity: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::corrupt(entity, format!("invalid UUID {raw}: {e}")))
}

pub(crate) fn id_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// Datetimes travel as RFC 3339 strings and are cast with `<datetime>`
/// in the statement.
pub(crate) fn timestamp(at: &DateTime<Utc>) -> serde_json::Value {
    serde_json::Value::String(at.to_rfc3339())
}
