//! SurrealDB connection management.

use std::env;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::store::SurrealStore;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000` or `ws://db:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "thingmesh".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Defaults overridden by `THINGMESH_DB_URL`, `THINGMESH_DB_NAMESPACE`,
    /// `THINGMESH_DB_DATABASE`, `THINGMESH_DB_USER` and `THINGMESH_DB_PASS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| env::var(name).unwrap_or(default);
        Self {
            url: var("THINGMESH_DB_URL", defaults.url),
            namespace: var("THINGMESH_DB_NAMESPACE", defaults.namespace),
            database: var("THINGMESH_DB_DATABASE", defaults.database),
            username: var("THINGMESH_DB_USER", defaults.username),
            password: var("THINGMESH_DB_PASS", defaults.password),
        }
    }

    /// The `host:port` the WebSocket engine dials; a `ws://` scheme and
    /// trailing slashes are dropped.
    pub fn address(&self) -> &str {
        let url = self.url.trim();
        url.strip_prefix("ws://")
            .unwrap_or(url)
            .trim_end_matches('/')
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let address = config.address();
        info!(
            address,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(address).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Bring the selected database up to the current schema version.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    /// Every repository over this connection.
    pub fn store(&self) -> SurrealStore<Client> {
        SurrealStore::new(self.db.clone())
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
