//! In-process [`PermissionStore`] kept behind a lock.
//!
//! Behaves like the relational store: lookups ignore unknown ids, grants
//! reference existing entities, duplicates are rejected and a write batch is
//! all-or-nothing. An optional parameter limit rejects id lists longer than
//! a backend would accept, which makes missing chunking visible in tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use permissions_sdk::{
    DefaultTemplates, Entity, PermissionGrant, PermissionTemplate, Subject, Visibility,
};
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::ports::TemplateReadModel;
use crate::domain::store::{
    GrantFilter, GrantWrite, Membership, MembershipFilter, PermissionStore, ScopeMatch,
    SubjectMatch, WriteOutcome,
};

#[derive(Default)]
struct State {
    users: BTreeMap<Uuid, String>,
    groups: BTreeMap<Uuid, String>,
    memberships: HashSet<Membership>,
    entities: HashMap<Uuid, Entity>,
    grants: Vec<PermissionGrant>,
    templates: BTreeMap<Uuid, PermissionTemplate>,
    defaults: DefaultTemplates,
}

#[derive(Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<State>,
    parameter_limit: Option<usize>,
    queries: AtomicUsize,
}

impl InMemoryPermissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects any query carrying an id list longer than `limit`.
    #[must_use]
    pub fn with_parameter_limit(limit: usize) -> Self {
        Self {
            parameter_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Number of read queries served so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn check_list(&self, len: usize) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        match self.parameter_limit {
            Some(limit) if len > limit => Err(StoreError::backend(format!(
                "too many parameters: {len} > {limit}"
            ))),
            _ => Ok(()),
        }
    }

    fn check_grant_filter(&self, filter: &GrantFilter) -> Result<(), StoreError> {
        let subjects = match &filter.subjects {
            SubjectMatch::OneOf(subjects) => subjects.len(),
            SubjectMatch::Any | SubjectMatch::Kind(_) => 0,
        };
        let entities = match &filter.scope {
            ScopeMatch::Entities(uuids) => uuids.len(),
            _ => 0,
        };
        self.check_list(subjects.max(entities))
    }

    // --- seeding -------------------------------------------------------

    pub fn add_user(&self, uuid: Uuid, login: &str) {
        self.state.write().users.insert(uuid, login.to_owned());
    }

    /// Deletes the user along with its grants and memberships.
    pub fn remove_user(&self, uuid: Uuid) {
        let mut state = self.state.write();
        state.users.remove(&uuid);
        state.memberships.retain(|m| m.user_uuid != uuid);
        state.grants.retain(|g| g.subject != Subject::User(uuid));
    }

    pub fn add_group(&self, uuid: Uuid, name: &str) {
        self.state.write().groups.insert(uuid, name.to_owned());
    }

    /// # Errors
    /// `StoreError::Constraint` if the group or the user does not exist.
    pub fn add_member(&self, group: Uuid, user: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.groups.contains_key(&group) || !state.users.contains_key(&user) {
            return Err(StoreError::constraint(format!(
                "membership {group}/{user} references a missing group or user"
            )));
        }
        state.memberships.insert(Membership {
            group_uuid: group,
            user_uuid: user,
        });
        Ok(())
    }

    pub fn add_entity(&self, entity: Entity) {
        self.state.write().entities.insert(entity.uuid, entity);
    }

    pub fn set_visibility(&self, entity: Uuid, visibility: Visibility) {
        if let Some(entity) = self.state.write().entities.get_mut(&entity) {
            entity.visibility = visibility;
        }
    }

    /// Deletes the entity. Its grants go with it.
    pub fn remove_entity(&self, uuid: Uuid) {
        let mut state = self.state.write();
        state.entities.remove(&uuid);
        state.grants.retain(|g| g.entity_uuid != Some(uuid));
    }

    /// Stores a grant without any constraint check, e.g. one whose entity
    /// was deleted behind the store's back.
    pub fn insert_raw_grant(&self, grant: PermissionGrant) {
        self.state.write().grants.push(grant);
    }

    pub fn add_template(&self, template: PermissionTemplate) {
        self.state.write().templates.insert(template.uuid, template);
    }

    pub fn set_default_templates(&self, defaults: DefaultTemplates) {
        self.state.write().defaults = defaults;
    }

    /// Snapshot of every stored grant.
    #[must_use]
    pub fn grants(&self) -> Vec<PermissionGrant> {
        self.state.read().grants.clone()
    }
}

fn apply_op(
    state: &State,
    grants: &mut Vec<PermissionGrant>,
    outcome: &mut WriteOutcome,
    op: GrantWrite,
) -> Result<(), StoreError> {
    match op {
        GrantWrite::Insert(grant) => {
            if let Some(entity) = grant.entity_uuid
                && !state.entities.contains_key(&entity)
            {
                return Err(StoreError::constraint(format!(
                    "grant references missing entity {entity}"
                )));
            }
            if grants.contains(&grant) {
                return Err(StoreError::constraint(format!(
                    "grant already exists: {} {} on {:?}",
                    grant.subject, grant.permission, grant.entity_uuid
                )));
            }
            grants.push(grant.clone());
            outcome.inserted.push(grant);
        }
        GrantWrite::Delete(filter) => {
            let (removed, kept): (Vec<_>, Vec<_>) =
                grants.drain(..).partition(|g| filter.matches(g));
            *grants = kept;
            outcome.deleted.extend(removed);
        }
    }
    Ok(())
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn find_entities(&self, uuids: &[Uuid]) -> Result<Vec<Entity>, StoreError> {
        self.check_list(uuids.len())?;
        let state = self.state.read();
        Ok(uuids
            .iter()
            .filter_map(|uuid| state.entities.get(uuid).cloned())
            .collect())
    }

    async fn existing_users(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        self.check_list(uuids.len())?;
        let state = self.state.read();
        Ok(uuids
            .iter()
            .copied()
            .filter(|uuid| state.users.contains_key(uuid))
            .collect())
    }

    async fn existing_groups(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        self.check_list(uuids.len())?;
        let state = self.state.read();
        Ok(uuids
            .iter()
            .copied()
            .filter(|uuid| state.groups.contains_key(uuid))
            .collect())
    }

    async fn group_uuids_of_user(&self, user: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.check_list(1)?;
        let state = self.state.read();
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user_uuid == user)
            .map(|m| m.group_uuid)
            .collect())
    }

    async fn find_memberships(
        &self,
        filter: &MembershipFilter,
    ) -> Result<Vec<Membership>, StoreError> {
        let groups = filter.groups.as_ref().map_or(0, Vec::len);
        let users = filter.users.as_ref().map_or(0, Vec::len);
        self.check_list(groups.max(users))?;
        let state = self.state.read();
        Ok(state
            .memberships
            .iter()
            .filter(|m| filter.matches(m))
            .copied()
            .collect())
    }

    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<PermissionGrant>, StoreError> {
        self.check_grant_filter(filter)?;
        let state = self.state.read();
        Ok(state
            .grants
            .iter()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect())
    }

    async fn write(&self, ops: Vec<GrantWrite>) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.write();
        let mut grants = state.grants.clone();
        let mut outcome = WriteOutcome::default();
        for op in ops {
            apply_op(&state, &mut grants, &mut outcome, op)?;
        }
        state.grants = grants;
        Ok(outcome)
    }
}

#[async_trait]
impl TemplateReadModel for InMemoryPermissionStore {
    async fn find_template(&self, uuid: Uuid) -> Result<Option<PermissionTemplate>, StoreError> {
        Ok(self.state.read().templates.get(&uuid).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<PermissionTemplate>, StoreError> {
        Ok(self.state.read().templates.values().cloned().collect())
    }

    async fn default_templates(&self) -> Result<DefaultTemplates, StoreError> {
        Ok(self.state.read().defaults)
    }
}
