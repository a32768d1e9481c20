//! Interfaces to the services the core consumes but does not implement.

use uuid::Uuid;

use crate::error::MeshResult;

/// Resolves a bearer credential to the user it was issued to.
///
/// Every failure is reported as [`crate::Error::Authentication`].
pub trait IdentityGateway: Send + Sync {
    fn identify(&self, token: &str) -> impl Future<Output = MeshResult<String>> + Send;
}

/// Source of new entity identifiers and thing keys.
pub trait IdProvider: Send + Sync {
    fn new_id(&self) -> MeshResult<Uuid>;
}

/// Random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn new_id(&self) -> MeshResult<Uuid> {
        Ok(Uuid::new_v4())
    }
}
