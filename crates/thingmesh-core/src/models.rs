//! Domain models for Thingmesh.
//!
//! These are the core types shared across all crates.

pub mod connection;
pub mod group;
pub mod membership;
pub mod org;
pub mod profile;
pub mod role;
pub mod snapshot;
pub mod thing;
