//! Integration tests for org, group and membership operations.

mod common;

use std::time::Duration;

use common::*;
use thingmesh_core::collaborator::{IdProvider, IdentityGateway, UuidProvider};
use thingmesh_core::error::{Error, MeshResult, ValidationError};
use thingmesh_core::models::group::UpdateGroup;
use thingmesh_core::models::membership::MemberRole;
use thingmesh_core::models::org::{CreateOrg, UpdateOrg};
use thingmesh_core::models::thing::CreateThing;
use thingmesh_core::page::{MAX_NAME_SIZE, PageMetadata};
use thingmesh_core::{ErrorKind, Role};
use thingmesh_service::{ServiceConfig, ThingsService};
use uuid::Uuid;

fn all() -> PageMetadata {
    PageMetadata {
        limit: -1,
        ..Default::default()
    }
}

#[tokio::test]
async fn viewer_can_view_but_not_update_group() {
    let svc = service().await;
    let (_org, group) = org_with_group(&svc).await;

    let viewed = svc.view_group(VIEWER, group.id).await.unwrap();
    assert_eq!(viewed.id, group.id);

    let err = svc
        .update_group(
            VIEWER,
            group.id,
            UpdateGroup {
                name: Some("renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(svc.view_group(OWNER, group.id).await.unwrap().name, "floor-1");
}

#[tokio::test]
async fn org_owner_needs_no_membership() {
    let svc = service().await;
    let (org, group) = org_with_group(&svc).await;

    let (_, role) = svc
        .resolver()
        .authorize_group("u-owner", group.id, Role::Viewer)
        .await
        .unwrap();
    assert_eq!(role, Role::Owner);

    let updated = svc
        .update_group(
            OWNER,
            group.id,
            UpdateGroup {
                description: Some("ground floor".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "ground floor");

    // A second group without any membership rows is still the owner's.
    let other = svc
        .create_groups(OWNER, org.id, vec![group_input("floor-2")])
        .await
        .unwrap()
        .remove(0);
    svc.resolver()
        .resolve("u-owner", other.id, Role::Owner)
        .await
        .unwrap();
}

#[tokio::test]
async fn roles_are_monotonic() {
    let svc = service().await;
    let (_org, group) = org_with_group(&svc).await;

    let callers = [
        (VIEWER, Role::Viewer),
        (EDITOR, Role::Editor),
        (GROUP_ADMIN, Role::Admin),
        (OWNER, Role::Owner),
    ];
    for (token, held) in callers {
        let viewed = svc.view_group(token, group.id).await;
        assert!(viewed.is_ok(), "{held} should view");

        let created = svc
            .create_things(
                token,
                group.id,
                vec![CreateThing {
                    name: format!("by-{held}"),
                    ..Default::default()
                }],
            )
            .await;
        assert_eq!(created.is_ok(), held >= Role::Editor, "{held} creating things");

        let updated = svc
            .update_group(
                token,
                group.id,
                UpdateGroup {
                    description: Some(format!("touched by {held}")),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(updated.is_ok(), held >= Role::Admin, "{held} updating group");
        if let Err(e) = updated {
            assert_eq!(e.kind(), ErrorKind::Authorization);
        }
    }

    let err = svc.view_group(STRANGER, group.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn platform_admin_resolves_to_owner_everywhere() {
    let svc = service().await;
    let (org, group) = org_with_group(&svc).await;

    svc.resolver()
        .resolve("root", group.id, Role::Owner)
        .await
        .unwrap();
    svc.update_org(
        PLATFORM_ADMIN,
        org.id,
        UpdateOrg {
            description: Some("audited".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let orgs = svc.list_orgs(PLATFORM_ADMIN, all()).await.unwrap();
    assert_eq!(orgs.total, 1);
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let svc = service().await;
    let err = svc.view_group(OWNER, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn bad_token_fails_before_any_lookup() {
    let svc = service().await;
    let err = svc.view_group("nope", Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    let err = svc.view_group("", Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

struct SlowIdentity;

impl IdentityGateway for SlowIdentity {
    async fn identify(&self, _token: &str) -> MeshResult<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("late".into())
    }
}

#[tokio::test]
async fn identity_timeout_is_authentication_error() {
    let config = ServiceConfig {
        identity_timeout: Duration::from_millis(20),
        ..config()
    };
    let svc = ThingsService::new(store().await, SlowIdentity, UuidProvider, config);
    let err = svc
        .create_org(
            "any",
            CreateOrg {
                name: "acme".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

struct ExhaustedIds;

impl IdProvider for ExhaustedIds {
    fn new_id(&self) -> MeshResult<Uuid> {
        Err(Error::Internal("id source unavailable".into()))
    }
}

#[tokio::test]
async fn id_provider_failure_is_internal() {
    let svc = ThingsService::new(store().await, identity(), ExhaustedIds, config());
    let err = svc
        .create_org(
            OWNER,
            CreateOrg {
                name: "acme".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    // An explicit ID needs no provider.
    let org = svc
        .create_org(
            OWNER,
            CreateOrg {
                id: Some(Uuid::new_v4()),
                name: "acme".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(org.owner_id, "u-owner");
}

#[tokio::test]
async fn create_with_existing_id_is_conflict() {
    let svc = service().await;
    let id = Uuid::new_v4();
    let input = CreateOrg {
        id: Some(id),
        name: "acme".into(),
        ..Default::default()
    };
    svc.create_org(OWNER, input.clone()).await.unwrap();
    let err = svc.create_org(OWNER, input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn group_batches_validate_names() {
    let svc = service().await;
    let (org, _group) = org_with_group(&svc).await;

    let err = svc.create_groups(OWNER, org.id, Vec::new()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::EmptyList)));

    let err = svc
        .create_groups(OWNER, org.id, vec![group_input(&"x".repeat(MAX_NAME_SIZE + 1))])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::NameSize)));

    let err = svc
        .create_groups(OWNER, org.id, vec![group_input("a"), group_input("a")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Clashing with an existing name writes nothing from the batch.
    let err = svc
        .create_groups(OWNER, org.id, vec![group_input("fresh"), group_input("floor-1")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let groups = svc.list_groups_by_org(OWNER, org.id, all()).await.unwrap();
    assert_eq!(groups.total, 1);
}

#[tokio::test]
async fn editors_may_create_groups_in_their_org() {
    let svc = service().await;
    let (org, _group) = org_with_group(&svc).await;

    svc.create_groups(EDITOR, org.id, vec![group_input("lab")])
        .await
        .unwrap();
    let err = svc
        .create_groups(VIEWER, org.id, vec![group_input("lab-2")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = svc
        .create_groups(STRANGER, org.id, vec![group_input("lab-3")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn group_listing_follows_visibility() {
    let svc = service().await;
    let (org, group) = org_with_group(&svc).await;
    svc.create_groups(OWNER, org.id, vec![group_input("floor-2")])
        .await
        .unwrap();

    assert_eq!(svc.list_groups(OWNER, all()).await.unwrap().total, 2);
    assert_eq!(svc.list_groups(PLATFORM_ADMIN, all()).await.unwrap().total, 2);

    let seen = svc.list_groups(VIEWER, all()).await.unwrap();
    assert_eq!(seen.total, 1);
    assert_eq!(seen.items[0].id, group.id);

    let by_org = svc.list_groups_by_org(VIEWER, org.id, all()).await.unwrap();
    assert_eq!(by_org.total, 1);
    let by_org = svc.list_groups_by_org(OWNER, org.id, all()).await.unwrap();
    assert_eq!(by_org.total, 2);

    assert_eq!(svc.list_groups(STRANGER, all()).await.unwrap().total, 0);
    let err = svc
        .list_groups_by_org(STRANGER, org.id, all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn org_listing_and_updates() {
    let svc = service().await;
    let (org, _group) = org_with_group(&svc).await;
    svc.create_org(
        STRANGER,
        CreateOrg {
            name: "elsewhere".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let visible = svc.list_orgs(VIEWER, all()).await.unwrap();
    assert_eq!(visible.total, 1);
    assert_eq!(visible.items[0].id, org.id);
    assert_eq!(svc.list_orgs(PLATFORM_ADMIN, all()).await.unwrap().total, 2);

    assert_eq!(svc.view_org(VIEWER, org.id).await.unwrap().name, "acme");
    let err = svc.view_org(STRANGER, org.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Group admins are not org owners.
    let err = svc
        .update_org(
            GROUP_ADMIN,
            org.id,
            UpdateOrg {
                name: Some("hijacked".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let renamed = svc
        .update_org(
            OWNER,
            org.id,
            UpdateOrg {
                name: Some("acme-2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "acme-2");
}

#[tokio::test]
async fn membership_lifecycle() {
    let svc = service().await;
    let (_org, group) = org_with_group(&svc).await;

    let err = svc
        .create_group_memberships(
            OWNER,
            group.id,
            vec![MemberRole {
                member_id: "u-new".into(),
                role: Role::Owner,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::InvalidRole)));

    let err = svc
        .create_group_memberships(
            OWNER,
            group.id,
            vec![MemberRole {
                member_id: "u-viewer".into(),
                role: Role::Editor,
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Editors cannot manage members.
    let err = svc
        .create_group_memberships(
            EDITOR,
            group.id,
            vec![MemberRole {
                member_id: "u-new".into(),
                role: Role::Viewer,
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    svc.update_group_memberships(
        GROUP_ADMIN,
        group.id,
        vec![MemberRole {
            member_id: "u-viewer".into(),
            role: Role::Editor,
        }],
    )
    .await
    .unwrap();
    svc.create_things(
        VIEWER,
        group.id,
        vec![CreateThing {
            name: "promoted".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();

    let err = svc
        .update_group_memberships(
            OWNER,
            group.id,
            vec![MemberRole {
                member_id: "u-ghost".into(),
                role: Role::Viewer,
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let page = svc
        .list_group_memberships(VIEWER, group.id, PageMetadata {
            order: "name".into(),
            ..all()
        })
        .await
        .unwrap();
    let members: Vec<&str> = page.items.iter().map(|m| m.member_id.as_str()).collect();
    assert_eq!(members, vec!["u-admin", "u-editor", "u-viewer"]);

    let err = svc
        .remove_group_memberships(OWNER, group.id, vec!["u-ghost".into()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    svc.remove_group_memberships(OWNER, group.id, vec!["u-viewer".into()])
        .await
        .unwrap();
    let err = svc.view_group(VIEWER, group.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}
