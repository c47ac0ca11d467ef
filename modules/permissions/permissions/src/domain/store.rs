//! Storage port for grants and the tables they are resolved against.
//!
//! One narrow trait covers what the resolver, mutator and template applier
//! need. Implementations live in `infra`; the domain never sees backend types.

use std::collections::HashSet;

use async_trait::async_trait;
use permissions_sdk::{Entity, PermissionGrant, Subject, SubjectKind};
use uuid::Uuid;

use crate::domain::error::StoreError;

/// Which grant holders a query selects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubjectMatch {
    #[default]
    Any,
    Kind(SubjectKind),
    /// Exactly these subjects. An empty list matches nothing.
    OneOf(Vec<Subject>),
}

impl SubjectMatch {
    #[must_use]
    pub fn matches(&self, subject: &Subject) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => subject.kind() == *kind,
            Self::OneOf(subjects) => subjects.contains(subject),
        }
    }
}

/// Which grant scope a query selects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScopeMatch {
    #[default]
    Any,
    Global,
    AnyEntity,
    Entity(Uuid),
    /// An empty list matches nothing.
    Entities(Vec<Uuid>),
}

impl ScopeMatch {
    #[must_use]
    pub fn matches(&self, entity_uuid: Option<Uuid>) -> bool {
        match (self, entity_uuid) {
            (Self::Any, _) | (Self::Global, None) | (Self::AnyEntity, Some(_)) => true,
            (Self::Entity(expected), Some(actual)) => *expected == actual,
            (Self::Entities(expected), Some(actual)) => expected.contains(&actual),
            _ => false,
        }
    }
}

/// Grant selection used for both reads and deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub subjects: SubjectMatch,
    pub permission: Option<String>,
    pub scope: ScopeMatch,
}

impl GrantFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subjects(mut self, subjects: SubjectMatch) -> Self {
        self.subjects = subjects;
        self
    }

    #[must_use]
    pub fn subject(self, subject: Subject) -> Self {
        self.subjects(SubjectMatch::OneOf(vec![subject]))
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: ScopeMatch) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn matches(&self, grant: &PermissionGrant) -> bool {
        self.subjects.matches(&grant.subject)
            && self
                .permission
                .as_deref()
                .is_none_or(|p| p == grant.permission)
            && self.scope.matches(grant.entity_uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Membership {
    pub group_uuid: Uuid,
    pub user_uuid: Uuid,
}

/// `None` leaves a side unconstrained; an empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipFilter {
    pub groups: Option<Vec<Uuid>>,
    pub users: Option<Vec<Uuid>>,
}

impl MembershipFilter {
    #[must_use]
    pub fn in_groups(groups: Vec<Uuid>) -> Self {
        Self {
            groups: Some(groups),
            users: None,
        }
    }

    #[must_use]
    pub fn users(mut self, users: Vec<Uuid>) -> Self {
        self.users = Some(users);
        self
    }

    #[must_use]
    pub fn matches(&self, membership: &Membership) -> bool {
        self.groups
            .as_ref()
            .is_none_or(|g| g.contains(&membership.group_uuid))
            && self
                .users
                .as_ref()
                .is_none_or(|u| u.contains(&membership.user_uuid))
    }
}

/// One step of an atomic write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantWrite {
    Insert(PermissionGrant),
    Delete(GrantFilter),
}

/// Grants actually changed by a committed write batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub inserted: Vec<PermissionGrant>,
    pub deleted: Vec<PermissionGrant>,
}

impl WriteOutcome {
    #[must_use]
    pub fn deleted_count(&self) -> u64 {
        self.deleted.len() as u64
    }

    /// Drops grants that were deleted and inserted again by the same batch.
    #[must_use]
    pub fn without_unchanged(self) -> Self {
        let deleted: HashSet<&PermissionGrant> = self.deleted.iter().collect();
        let inserted: HashSet<&PermissionGrant> = self.inserted.iter().collect();
        let unchanged: HashSet<PermissionGrant> = deleted
            .intersection(&inserted)
            .map(|g| (*g).clone())
            .collect();
        if unchanged.is_empty() {
            return self;
        }
        Self {
            inserted: self
                .inserted
                .into_iter()
                .filter(|g| !unchanged.contains(g))
                .collect(),
            deleted: self
                .deleted
                .into_iter()
                .filter(|g| !unchanged.contains(g))
                .collect(),
        }
    }
}

/// Persistence port for grants, entities, users, groups and memberships.
///
/// Lookups never fail for unknown ids: they are simply absent from the
/// result. Callers keep id lists within the configured batch size.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Existing entities among `uuids`.
    async fn find_entities(&self, uuids: &[Uuid]) -> Result<Vec<Entity>, StoreError>;

    /// Existing users among `uuids`.
    async fn existing_users(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// Existing groups among `uuids`.
    async fn existing_groups(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// Groups `user` is an explicit member of. `Anyone` is implicit and not
    /// returned.
    async fn group_uuids_of_user(&self, user: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn find_memberships(
        &self,
        filter: &MembershipFilter,
    ) -> Result<Vec<Membership>, StoreError>;

    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<PermissionGrant>, StoreError>;

    /// Applies `ops` in order inside one transaction. Either every step takes
    /// effect or none does.
    ///
    /// # Errors
    /// `StoreError::Constraint` for duplicate grants or grants referencing a
    /// missing entity; `StoreError::Backend` for anything else.
    async fn write(&self, ops: Vec<GrantWrite>) -> Result<WriteOutcome, StoreError>;
}
