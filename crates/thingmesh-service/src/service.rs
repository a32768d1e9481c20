//! The Thingmesh service: every public operation lives on
//! [`ThingsService`], split across the operation modules of this crate.

use thingmesh_core::collaborator::{IdProvider, IdentityGateway};
use thingmesh_core::error::{Error, MeshResult, ValidationError};
use thingmesh_core::page::{MAX_NAME_SIZE, PageMetadata, Query};
use thingmesh_core::repository::Store;
use tracing::debug;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::IdentityError;
use crate::resolver::RoleResolver;

/// Authorization and resource-graph service.
///
/// Generic over the storage bundle and both collaborators so that the
/// service layer has no dependency on the database crate.
pub struct ThingsService<S: Store, I: IdentityGateway, P: IdProvider> {
    pub(crate) store: S,
    identity: I,
    ids: P,
    pub(crate) resolver: RoleResolver<S>,
    config: ServiceConfig,
}

impl<S: Store, I: IdentityGateway, P: IdProvider> ThingsService<S, I, P> {
    pub fn new(store: S, identity: I, ids: P, config: ServiceConfig) -> Self {
        let resolver = RoleResolver::new(store.clone(), config.admin_ids.clone());
        Self {
            store,
            identity,
            ids,
            resolver,
            config,
        }
    }

    pub fn resolver(&self) -> &RoleResolver<S> {
        &self.resolver
    }

    /// Resolve the caller behind `token`, bounded by the configured
    /// identity timeout.
    pub(crate) async fn identify(&self, token: &str) -> MeshResult<String> {
        match tokio::time::timeout(self.config.identity_timeout, self.identity.identify(token))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                debug!("Identity lookup timed out");
                Err(IdentityError::Timeout.into())
            }
        }
    }

    pub(crate) fn new_id(&self) -> MeshResult<Uuid> {
        self.ids.new_id()
    }

    /// Validate `pm` against this service's `max_limit`.
    pub(crate) fn query(&self, pm: &PageMetadata) -> MeshResult<Query> {
        Ok(pm.validate(self.config.max_limit)?)
    }
}

/// Parse a transport-supplied entity ID. Malformed IDs cannot name an
/// existing entity, so they are reported as `NotFound`.
pub fn parse_id(entity: &str, raw: &str) -> MeshResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::not_found(entity, raw))
}

pub(crate) fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_SIZE {
        return Err(ValidationError::NameSize);
    }
    Ok(())
}

/// Metadata defaults to an empty object and must otherwise be one.
pub(crate) fn check_metadata(
    metadata: Option<serde_json::Value>,
) -> Result<serde_json::Value, ValidationError> {
    match metadata {
        None | Some(serde_json::Value::Null) => Ok(serde_json::Value::Object(Default::default())),
        Some(value @ serde_json::Value::Object(_)) => Ok(value),
        Some(_) => Err(ValidationError::InvalidMetadata),
    }
}

/// Sorted IDs with repeats dropped.
pub(crate) fn distinct(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids.dedup();
    ids
}

pub(crate) fn non_empty<T>(items: &[T]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyList);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use thingmesh_core::ErrorKind;

    use super::*;

    #[test]
    fn malformed_ids_are_not_found() {
        let err = parse_id("thing", "not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let id = Uuid::new_v4();
        assert_eq!(parse_id("thing", &id.to_string()).unwrap(), id);
    }

    #[test]
    fn names_are_bounded() {
        assert_eq!(check_name(""), Err(ValidationError::NameSize));
        assert!(check_name(&"a".repeat(MAX_NAME_SIZE)).is_ok());
        assert_eq!(
            check_name(&"a".repeat(MAX_NAME_SIZE + 1)),
            Err(ValidationError::NameSize)
        );
    }

    #[test]
    fn distinct_drops_repeats() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(distinct(vec![b, a, b, a]), distinct(vec![a, b]));
        assert_eq!(distinct(vec![a, b, a]).len(), 2);
    }

    #[test]
    fn metadata_must_be_an_object() {
        assert_eq!(check_metadata(None).unwrap(), json!({}));
        assert_eq!(check_metadata(Some(json!({"a": 1}))).unwrap(), json!({"a": 1}));
        assert_eq!(
            check_metadata(Some(json!([1, 2]))),
            Err(ValidationError::InvalidMetadata)
        );
    }
}
