//! [`Store`] bundle over a single SurrealDB handle.

use surrealdb::{Connection, Surreal};
use thingmesh_core::repository::Store;

use crate::repository::{
    SurrealConnectionRepository, SurrealGroupRepository, SurrealMembershipRepository,
    SurrealOrgRepository, SurrealProfileRepository, SurrealSnapshotRepository,
    SurrealThingRepository,
};

/// Every SurrealDB repository, sharing one client.
pub struct SurrealStore<C: Connection> {
    db: Surreal<C>,
    orgs: SurrealOrgRepository<C>,
    groups: SurrealGroupRepository<C>,
    memberships: SurrealMembershipRepository<C>,
    things: SurrealThingRepository<C>,
    profiles: SurrealProfileRepository<C>,
    connections: SurrealConnectionRepository<C>,
    snapshots: SurrealSnapshotRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            orgs: SurrealOrgRepository::new(db.clone()),
            groups: SurrealGroupRepository::new(db.clone()),
            memberships: SurrealMembershipRepository::new(db.clone()),
            things: SurrealThingRepository::new(db.clone()),
            profiles: SurrealProfileRepository::new(db.clone()),
            connections: SurrealConnectionRepository::new(db.clone()),
            snapshots: SurrealSnapshotRepository::new(db.clone()),
            db,
        }
    }
}

// A derive would demand `C: Clone`, which engine markers don't implement.
impl<C: Connection> Clone for SurrealStore<C> {
    fn clone(&self) -> Self {
        Self::new(self.db.clone())
    }
}

impl<C: Connection> Store for SurrealStore<C> {
    type Orgs = SurrealOrgRepository<C>;
    type Groups = SurrealGroupRepository<C>;
    type Memberships = SurrealMembershipRepository<C>;
    type Things = SurrealThingRepository<C>;
    type Profiles = SurrealProfileRepository<C>;
    type Connections = SurrealConnectionRepository<C>;
    type Snapshots = SurrealSnapshotRepository<C>;

    fn orgs(&self) -> &Self::Orgs {
        &self.orgs
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn memberships(&self) -> &Self::Memberships {
        &self.memberships
    }

    fn things(&self) -> &Self::Things {
        &self.things
    }

    fn profiles(&self) -> &Self::Profiles {
        &self.profiles
    }

    fn connections(&self) -> &Self::Connections {
        &self.connections
    }

    fn snapshots(&self) -> &Self::Snapshots {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use surrealdb::engine::local::Mem;
    use thingmesh_core::models::org::Org;
    use thingmesh_core::repository::OrgRepository;
    use uuid::Uuid;

    use super::*;

    fn assert_store<S: Store>(store: &S) -> S {
        store.clone()
    }

    #[tokio::test]
    async fn clones_share_one_database() {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        crate::run_migrations(&db).await.unwrap();
        let store = SurrealStore::new(db);
        let copy = assert_store(&store);

        let now = Utc::now();
        let org = Org {
            id: Uuid::new_v4(),
            owner_id: "owner".into(),
            name: "acme".into(),
            description: String::new(),
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        };
        store.orgs().create(org.clone()).await.unwrap();
        assert_eq!(copy.orgs().get_by_id(org.id).await.unwrap().name, "acme");
    }
}
