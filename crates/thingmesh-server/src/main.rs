//! Thingmesh Server — Application entry point.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use thingmesh_core::collaborator::UuidProvider;
use thingmesh_core::page::DEFAULT_MAX_LIMIT;
use thingmesh_db::{DbConfig, DbManager};
use thingmesh_service::{IdentityConfig, JwtIdentity, ServiceConfig, ThingsService};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn var_or(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, BoxError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| format!("invalid {name}: {e}").into()),
        Err(_) => Ok(default),
    }
}

fn service_config() -> Result<ServiceConfig, BoxError> {
    let admin_ids: HashSet<String> = env::var("THINGMESH_ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    let timeout_ms = parse_var("THINGMESH_IDENTITY_TIMEOUT_MS", 5_000u64)?;

    Ok(ServiceConfig {
        admin_ids,
        max_limit: parse_var("THINGMESH_MAX_LIMIT", DEFAULT_MAX_LIMIT)?,
        identity_timeout: Duration::from_millis(timeout_ms),
    })
}

fn identity_config() -> Result<IdentityConfig, BoxError> {
    let path = env::var("THINGMESH_JWT_PUBLIC_KEY")
        .map_err(|_| "THINGMESH_JWT_PUBLIC_KEY must point to a PEM public key")?;
    let defaults = IdentityConfig::default();
    Ok(IdentityConfig {
        public_key_pem: std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {path}: {e}"))?,
        issuer: var_or("THINGMESH_JWT_ISSUER", defaults.issuer),
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("thingmesh=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Thingmesh server...");

    let config = service_config()?;
    let admins = config.admin_ids.len();
    let identity = JwtIdentity::new(&identity_config()?)?;

    let db = DbManager::connect(&DbConfig::from_env()).await?;
    db.migrate().await?;

    let _service = ThingsService::new(
        db.store(),
        identity,
        UuidProvider,
        config,
    );
    tracing::info!(admins, "Thingmesh service ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Thingmesh server stopped.");
    Ok(())
}
