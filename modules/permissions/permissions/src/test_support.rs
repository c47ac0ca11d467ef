#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use permissions_sdk::{Entity, EntityQualifier, Visibility};
use uuid::Uuid;

use crate::config::PermissionsConfig;
use crate::domain::error::StoreError;
use crate::domain::events::GrantAuditEvent;
use crate::domain::ports::AuditSink;
use crate::domain::service::PermissionServices;
use crate::domain::store::{
    GrantFilter, GrantWrite, Membership, MembershipFilter, PermissionStore, WriteOutcome,
};
use crate::infra::storage::InMemoryPermissionStore;

/// Keeps every audit event for later assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<GrantAuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<GrantAuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &GrantAuditEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Delegates reads to the in-memory store and fails every write.
pub struct FailingWriteStore {
    pub inner: Arc<InMemoryPermissionStore>,
}

#[async_trait]
impl PermissionStore for FailingWriteStore {
    async fn find_entities(&self, uuids: &[Uuid]) -> Result<Vec<Entity>, StoreError> {
        self.inner.find_entities(uuids).await
    }

    async fn existing_users(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        self.inner.existing_users(uuids).await
    }

    async fn existing_groups(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        self.inner.existing_groups(uuids).await
    }

    async fn group_uuids_of_user(&self, user: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.inner.group_uuids_of_user(user).await
    }

    async fn find_memberships(
        &self,
        filter: &MembershipFilter,
    ) -> Result<Vec<Membership>, StoreError> {
        self.inner.find_memberships(filter).await
    }

    async fn find_grants(
        &self,
        filter: &GrantFilter,
    ) -> Result<Vec<permissions_sdk::PermissionGrant>, StoreError> {
        self.inner.find_grants(filter).await
    }

    async fn write(&self, _ops: Vec<GrantWrite>) -> Result<WriteOutcome, StoreError> {
        Err(StoreError::backend("disk I/O error"))
    }
}

pub struct Harness<S: PermissionStore> {
    pub store: Arc<S>,
    pub audit: Arc<RecordingAuditSink>,
    pub services: PermissionServices<S>,
}

pub fn harness(store: InMemoryPermissionStore) -> Harness<InMemoryPermissionStore> {
    harness_with_config(store, &PermissionsConfig::default())
}

pub fn harness_with_config(
    store: InMemoryPermissionStore,
    config: &PermissionsConfig,
) -> Harness<InMemoryPermissionStore> {
    let store = Arc::new(store);
    let audit = Arc::new(RecordingAuditSink::default());
    let services = PermissionServices::new(store.clone(), store.clone(), audit.clone(), config);
    Harness {
        store,
        audit,
        services,
    }
}

/// Services over a store whose writes always fail. Templates are read from
/// `inner`.
pub fn failing_harness(inner: InMemoryPermissionStore) -> Harness<FailingWriteStore> {
    let inner = Arc::new(inner);
    let store = Arc::new(FailingWriteStore {
        inner: inner.clone(),
    });
    let audit = Arc::new(RecordingAuditSink::default());
    let services = PermissionServices::new(
        store.clone(),
        inner,
        audit.clone(),
        &PermissionsConfig::default(),
    );
    Harness {
        store,
        audit,
        services,
    }
}

pub fn entity(key: &str, qualifier: EntityQualifier, visibility: Visibility) -> Entity {
    Entity {
        uuid: Uuid::new_v4(),
        key: key.to_owned(),
        qualifier,
        visibility,
    }
}

pub fn private_project(key: &str) -> Entity {
    entity(key, EntityQualifier::Project, Visibility::Private)
}

pub fn public_project(key: &str) -> Entity {
    entity(key, EntityQualifier::Project, Visibility::Public)
}

/// Adds a user with a generated login and returns its uuid.
pub fn seed_user(store: &InMemoryPermissionStore) -> Uuid {
    let uuid = Uuid::new_v4();
    store.add_user(uuid, &format!("user-{uuid}"));
    uuid
}

/// Adds a group containing `members` and returns its uuid.
pub fn seed_group(store: &InMemoryPermissionStore, members: &[Uuid]) -> Uuid {
    let uuid = Uuid::new_v4();
    store.add_group(uuid, &format!("group-{uuid}"));
    for member in members {
        store.add_member(uuid, *member).unwrap();
    }
    uuid
}
