//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings; roles are stored as strings with ASSERT constraints.
//! Uniqueness invariants (thing keys, group names within an org,
//! memberships, connections) are UNIQUE indexes so that concurrent
//! writers are serialized by the store, not the application.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations
-- =======================================================================
DEFINE TABLE org SCHEMAFULL;
DEFINE FIELD owner_id ON TABLE org TYPE string;
DEFINE FIELD name ON TABLE org TYPE string;
DEFINE FIELD description ON TABLE org TYPE string DEFAULT '';
DEFINE FIELD metadata ON TABLE org TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE org TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE org TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_org_owner ON TABLE org COLUMNS owner_id;

-- =======================================================================
-- Groups (org scope)
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD org_id ON TABLE group TYPE string;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE string DEFAULT '';
DEFINE FIELD metadata ON TABLE group TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE group TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_group_org_name ON TABLE group COLUMNS org_id, name UNIQUE;

-- =======================================================================
-- Memberships (group scope)
-- =======================================================================
DEFINE TABLE membership SCHEMAFULL;
DEFINE FIELD group_id ON TABLE membership TYPE string;
DEFINE FIELD member_id ON TABLE membership TYPE string;
DEFINE FIELD role ON TABLE membership TYPE string \
    ASSERT $value IN ['Viewer', 'Editor', 'Admin'];
DEFINE INDEX idx_membership_group_member ON TABLE membership \
    COLUMNS group_id, member_id UNIQUE;
DEFINE INDEX idx_membership_member ON TABLE membership COLUMNS member_id;

-- =======================================================================
-- Things (group scope)
-- =======================================================================
DEFINE TABLE thing SCHEMAFULL;
DEFINE FIELD group_id ON TABLE thing TYPE string;
DEFINE FIELD name ON TABLE thing TYPE string;
DEFINE FIELD key ON TABLE thing TYPE string;
DEFINE FIELD metadata ON TABLE thing TYPE object FLEXIBLE DEFAULT {};
DEFINE INDEX idx_thing_key ON TABLE thing COLUMNS key UNIQUE;
DEFINE INDEX idx_thing_group ON TABLE thing COLUMNS group_id;

-- =======================================================================
-- Profiles (group scope)
-- =======================================================================
DEFINE TABLE profile SCHEMAFULL;
DEFINE FIELD group_id ON TABLE profile TYPE string;
DEFINE FIELD name ON TABLE profile TYPE string;
DEFINE FIELD config ON TABLE profile TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD metadata ON TABLE profile TYPE object FLEXIBLE DEFAULT {};
DEFINE INDEX idx_profile_group ON TABLE profile COLUMNS group_id;

-- =======================================================================
-- Connections (thing <-> profile, same group)
-- =======================================================================
DEFINE TABLE connection SCHEMAFULL;
DEFINE FIELD thing_id ON TABLE connection TYPE string;
DEFINE FIELD profile_id ON TABLE connection TYPE string;
DEFINE FIELD group_id ON TABLE connection TYPE string;
DEFINE FIELD created_at ON TABLE connection TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_connection_pair ON TABLE connection \
    COLUMNS thing_id, profile_id UNIQUE;
DEFINE INDEX idx_connection_profile ON TABLE connection COLUMNS profile_id;
DEFINE INDEX idx_connection_group ON TABLE connection COLUMNS group_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied successfully");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
