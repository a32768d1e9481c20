//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Batch mutations are
//! all-or-nothing: an implementation must apply every row of a batch in
//! one storage transaction or none of them.
//!
//! Paged `list` methods filter, order and slice in storage according to
//! a validated [`Query`]; the caller decides the [`ListScope`].

use uuid::Uuid;

use crate::error::MeshResult;
use crate::models::{
    connection::Connection,
    group::{Group, UpdateGroup},
    membership::Membership,
    org::{Org, UpdateOrg},
    profile::{Profile, UpdateProfile},
    snapshot::Snapshot,
    thing::{Thing, UpdateThing},
};
use crate::page::{ListScope, Page, Query};

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

pub trait OrgRepository: Send + Sync {
    /// Insert a fully populated org. An existing ID yields `Conflict`.
    fn create(&self, org: Org) -> impl Future<Output = MeshResult<Org>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MeshResult<Org>> + Send;
    fn update(&self, id: Uuid, input: UpdateOrg) -> impl Future<Output = MeshResult<Org>> + Send;
    /// Remove the org and, in the same transaction, every group it owns
    /// together with the groups' things, profiles, connections and
    /// memberships.
    fn delete(&self, id: Uuid) -> impl Future<Output = MeshResult<()>> + Send;
    /// One page of orgs, restricted to `ids` unless `None`.
    fn list(
        &self,
        ids: Option<&[Uuid]>,
        query: &Query,
    ) -> impl Future<Output = MeshResult<Page<Org>>> + Send;
    fn ids_by_owner(&self, owner_id: &str) -> impl Future<Output = MeshResult<Vec<Uuid>>> + Send;
    fn list_by_ids(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<Vec<Org>>> + Send;
}

pub trait GroupRepository: Send + Sync {
    /// Insert a batch of groups in one transaction. A duplicate ID or a
    /// duplicate name within the org yields `Conflict`; a missing parent
    /// org yields `NotFound`.
    fn create_batch(&self, groups: Vec<Group>) -> impl Future<Output = MeshResult<Vec<Group>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MeshResult<Group>> + Send;
    fn update(&self, id: Uuid, input: UpdateGroup) -> impl Future<Output = MeshResult<Group>> + Send;
    /// Remove the groups and everything they own in one transaction.
    fn delete_batch(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<()>> + Send;
    fn list(
        &self,
        scope: &ListScope,
        query: &Query,
    ) -> impl Future<Output = MeshResult<Page<Group>>> + Send;
    /// IDs of every group of the given orgs.
    fn ids_by_orgs(&self, org_ids: &[Uuid]) -> impl Future<Output = MeshResult<Vec<Uuid>>> + Send;
    fn list_by_ids(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<Vec<Group>>> + Send;
}

pub trait MembershipRepository: Send + Sync {
    /// Insert memberships in one transaction; an existing
    /// `(group, member)` pair yields `Conflict`.
    fn create_batch(
        &self,
        memberships: Vec<Membership>,
    ) -> impl Future<Output = MeshResult<()>> + Send;
    /// Overwrite the role of existing memberships in one transaction.
    fn update_batch(
        &self,
        memberships: Vec<Membership>,
    ) -> impl Future<Output = MeshResult<()>> + Send;
    fn delete_batch(
        &self,
        group_id: Uuid,
        member_ids: &[String],
    ) -> impl Future<Output = MeshResult<()>> + Send;
    fn find(
        &self,
        group_id: Uuid,
        member_id: &str,
    ) -> impl Future<Output = MeshResult<Option<Membership>>> + Send;
    /// One page of a group's memberships. `id` and `name` ordering both
    /// sort by member ID, and the name filter applies to it.
    fn list(
        &self,
        group_id: Uuid,
        query: &Query,
    ) -> impl Future<Output = MeshResult<Page<Membership>>> + Send;
    fn list_by_group(&self, group_id: Uuid) -> impl Future<Output = MeshResult<Vec<Membership>>> + Send;
    fn list_by_member(
        &self,
        member_id: &str,
    ) -> impl Future<Output = MeshResult<Vec<Membership>>> + Send;
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

pub trait ThingRepository: Send + Sync {
    /// Insert a batch in one transaction. A duplicate key or ID anywhere
    /// in the batch yields `Conflict` and nothing is written.
    fn create_batch(&self, things: Vec<Thing>) -> impl Future<Output = MeshResult<Vec<Thing>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MeshResult<Thing>> + Send;
    fn get_by_key(&self, key: &str) -> impl Future<Output = MeshResult<Thing>> + Send;
    fn update(&self, id: Uuid, input: UpdateThing) -> impl Future<Output = MeshResult<Thing>> + Send;
    /// Replace the key; a collision yields `Conflict` and keeps the old key.
    fn update_key(&self, id: Uuid, key: String) -> impl Future<Output = MeshResult<Thing>> + Send;
    /// Remove things and their connections in one transaction.
    fn delete_batch(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<()>> + Send;
    fn list(
        &self,
        scope: &ListScope,
        query: &Query,
    ) -> impl Future<Output = MeshResult<Page<Thing>>> + Send;
    fn list_by_ids(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<Vec<Thing>>> + Send;
}

pub trait ProfileRepository: Send + Sync {
    fn create_batch(
        &self,
        profiles: Vec<Profile>,
    ) -> impl Future<Output = MeshResult<Vec<Profile>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = MeshResult<Profile>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateProfile,
    ) -> impl Future<Output = MeshResult<Profile>> + Send;
    /// Remove profiles and their connections in one transaction.
    fn delete_batch(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<()>> + Send;
    fn list(
        &self,
        scope: &ListScope,
        query: &Query,
    ) -> impl Future<Output = MeshResult<Page<Profile>>> + Send;
    fn list_by_ids(&self, ids: &[Uuid]) -> impl Future<Output = MeshResult<Vec<Profile>>> + Send;
}

// ---------------------------------------------------------------------------
// Connection graph
// ---------------------------------------------------------------------------

pub trait ConnectionRepository: Send + Sync {
    /// Insert connections in one transaction; an existing pair yields
    /// `Conflict`.
    fn connect(&self, connections: Vec<Connection>) -> impl Future<Output = MeshResult<()>> + Send;
    fn disconnect(
        &self,
        profile_id: Uuid,
        thing_ids: &[Uuid],
    ) -> impl Future<Output = MeshResult<()>> + Send;
    fn list_by_profile(
        &self,
        profile_id: Uuid,
    ) -> impl Future<Output = MeshResult<Vec<Connection>>> + Send;
    /// Connections of a thing, oldest first.
    fn list_by_thing(&self, thing_id: Uuid)
    -> impl Future<Output = MeshResult<Vec<Connection>>> + Send;
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

pub trait SnapshotRepository: Send + Sync {
    /// Read the subtree of the given orgs (`None`: every org) in one
    /// transaction.
    fn export(&self, org_ids: Option<Vec<Uuid>>) -> impl Future<Output = MeshResult<Snapshot>> + Send;
    /// Upsert every entity of the snapshot by ID in one transaction.
    fn import(&self, snapshot: Snapshot) -> impl Future<Output = MeshResult<()>> + Send;
}

/// Bundle of every repository the services need, so that consumers are
/// generic over a single storage type.
pub trait Store: Clone + Send + Sync + 'static {
    type Orgs: OrgRepository;
    type Groups: GroupRepository;
    type Memberships: MembershipRepository;
    type Things: ThingRepository;
    type Profiles: ProfileRepository;
    type Connections: ConnectionRepository;
    type Snapshots: SnapshotRepository;

    fn orgs(&self) -> &Self::Orgs;
    fn groups(&self) -> &Self::Groups;
    fn memberships(&self) -> &Self::Memberships;
    fn things(&self) -> &Self::Things;
    fn profiles(&self) -> &Self::Profiles;
    fn connections(&self) -> &Self::Connections;
    fn snapshots(&self) -> &Self::Snapshots;
}
