//! Service configuration.

use std::collections::HashSet;
use std::time::Duration;

use thingmesh_core::page::DEFAULT_MAX_LIMIT;

/// Configuration for [`crate::ThingsService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Users who resolve to `Owner` on every org and group.
    pub admin_ids: HashSet<String>,
    /// Upper bound for `limit` on every list operation.
    pub max_limit: i64,
    /// Upper bound for one identity round-trip (default: 5 seconds).
    pub identity_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            max_limit: DEFAULT_MAX_LIMIT,
            identity_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for the JWT identity gateway.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// PEM-encoded Ed25519 public key of the identity service.
    pub public_key_pem: String,
    /// Expected `iss` claim.
    pub issuer: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            public_key_pem: String::new(),
            issuer: "thingmesh".into(),
        }
    }
}
