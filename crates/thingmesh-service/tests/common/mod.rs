//! Shared setup for service integration tests.

#![allow(dead_code)]

use std::collections::HashSet;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use thingmesh_core::collaborator::UuidProvider;
use thingmesh_core::models::group::{CreateGroup, Group};
use thingmesh_core::models::membership::MemberRole;
use thingmesh_core::models::org::{CreateOrg, Org};
use thingmesh_core::Role;
use thingmesh_db::SurrealStore;
use thingmesh_service::{ServiceConfig, StaticIdentity, ThingsService};

pub type TestService = ThingsService<SurrealStore<Db>, StaticIdentity, UuidProvider>;

/// Owns every org created in [`org_with_group`].
pub const OWNER: &str = "owner-token";
pub const VIEWER: &str = "viewer-token";
pub const EDITOR: &str = "editor-token";
pub const GROUP_ADMIN: &str = "group-admin-token";
pub const STRANGER: &str = "stranger-token";
pub const PLATFORM_ADMIN: &str = "root-token";

pub fn identity() -> StaticIdentity {
    StaticIdentity::new()
        .with(OWNER, "u-owner")
        .with(VIEWER, "u-viewer")
        .with(EDITOR, "u-editor")
        .with(GROUP_ADMIN, "u-admin")
        .with(STRANGER, "u-stranger")
        .with(PLATFORM_ADMIN, "root")
}

pub fn config() -> ServiceConfig {
    ServiceConfig {
        admin_ids: HashSet::from(["root".to_string()]),
        ..Default::default()
    }
}

pub async fn store() -> SurrealStore<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    thingmesh_db::run_migrations(&db).await.unwrap();
    SurrealStore::new(db)
}

pub async fn service() -> TestService {
    ThingsService::new(store().await, identity(), UuidProvider, config())
}

/// A service plus a handle on its store, for asserting on stored rows.
pub async fn service_and_store() -> (TestService, SurrealStore<Db>) {
    let store = store().await;
    let svc = ThingsService::new(store.clone(), identity(), UuidProvider, config());
    (svc, store)
}

pub fn group_input(name: &str) -> CreateGroup {
    CreateGroup {
        name: name.into(),
        ..Default::default()
    }
}

/// Org "acme" owned by [`OWNER`] with group "floor-1", where the viewer,
/// editor and group admin hold the matching roles.
pub async fn org_with_group(svc: &TestService) -> (Org, Group) {
    let org = svc
        .create_org(
            OWNER,
            CreateOrg {
                name: "acme".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let group = svc
        .create_groups(OWNER, org.id, vec![group_input("floor-1")])
        .await
        .unwrap()
        .remove(0);
    svc.create_group_memberships(
        OWNER,
        group.id,
        vec![
            MemberRole {
                member_id: "u-viewer".into(),
                role: Role::Viewer,
            },
            MemberRole {
                member_id: "u-editor".into(),
                role: Role::Editor,
            },
            MemberRole {
                member_id: "u-admin".into(),
                role: Role::Admin,
            },
        ],
    )
    .await
    .unwrap();
    (org, group)
}
