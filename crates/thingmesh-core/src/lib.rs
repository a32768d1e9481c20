//! Thingmesh Core — domain models, error taxonomy, listing engine and the
//! traits through which services reach storage and external
//! collaborators.

pub mod collaborator;
pub mod error;
pub mod models;
pub mod page;
pub mod repository;

pub use error::{Error, ErrorKind, MeshResult, ValidationError};
pub use models::role::Role;
pub use page::{ListScope, Page, PageMetadata, Query};
