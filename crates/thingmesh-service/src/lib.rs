//! Thingmesh Service — role resolution and the org/group/thing/profile
//! operations, generic over the storage and identity collaborators.

mod backup;
pub mod config;
mod connections;
pub mod error;
mod hierarchy;
pub mod identity;
mod membership;
pub mod resolver;
mod resources;
pub mod service;

pub use config::{IdentityConfig, ServiceConfig};
pub use error::IdentityError;
pub use identity::{JwtIdentity, StaticIdentity};
pub use resolver::RoleResolver;
pub use service::{ThingsService, parse_id};
