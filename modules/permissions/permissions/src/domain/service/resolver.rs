use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use permissions_sdk::{Entity, Subject, SubjectKind, permission};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::batch::{self, Batcher};
use crate::domain::error::DomainError;
use crate::domain::store::{
    GrantFilter, Membership, MembershipFilter, PermissionStore, ScopeMatch, SubjectMatch,
};

/// The single edge ignored when counting holders of a global permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalPermissionExclusion {
    Nothing,
    /// Ignore the group's grant entirely.
    Group(Uuid),
    /// Ignore one user's membership in one group.
    Membership { group: Uuid, user: Uuid },
    /// Treat the user as absent: neither its direct grant nor its groups count.
    User(Uuid),
    /// Ignore the user's direct grant. Group paths still count.
    UserGrant(Uuid),
}

impl GlobalPermissionExclusion {
    #[must_use]
    pub fn from_parts(group: Option<Uuid>, user: Option<Uuid>) -> Self {
        match (group, user) {
            (None, None) => Self::Nothing,
            (Some(group), None) => Self::Group(group),
            (Some(group), Some(user)) => Self::Membership { group, user },
            (None, Some(user)) => Self::User(user),
        }
    }

    fn removes_user(self, user: Uuid) -> bool {
        self == Self::User(user)
    }

    fn skips_user_grant(self, user: Uuid) -> bool {
        self == Self::UserGrant(user)
    }

    fn skips_group(self, group: Uuid) -> bool {
        self == Self::Group(group)
    }

    fn skips_membership(self, membership: Membership) -> bool {
        self == Self::Membership {
            group: membership.group_uuid,
            user: membership.user_uuid,
        }
    }
}

/// How candidate users of one entity are authorized.
enum UserAccess {
    /// Public entity and browse permission: every existing user.
    AnyExistingUser,
    /// Direct grants, plus members of these groups.
    Granted { groups: Vec<Uuid> },
}

/// Answers authorization questions. Read-only.
pub struct ResolverService<S: PermissionStore> {
    store: Arc<S>,
    batcher: Batcher,
    chunk_concurrency: usize,
}

impl<S: PermissionStore> ResolverService<S> {
    pub fn new(store: Arc<S>, batcher: Batcher, chunk_concurrency: usize) -> Self {
        Self {
            store,
            batcher,
            chunk_concurrency: chunk_concurrency.max(1),
        }
    }

    /// Keeps the candidates on which `user` holds `permission`.
    ///
    /// Browse permissions on public entities need no grant. Anonymous callers
    /// only inherit `Anyone` grants. Unknown entities are never returned.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn keep_authorized_entities(
        &self,
        candidates: &[Uuid],
        user: Option<Uuid>,
        permission: &str,
    ) -> Result<HashSet<Uuid>, DomainError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let candidates = batch::distinct(candidates);
        let subject_chunks = self.batcher.split(&self.subjects_of(user).await?);
        let browse = permission::is_browse(permission);

        // No closure borrowing a chunk may live across an await.
        let lookups: Vec<_> = self
            .batcher
            .chunks(&candidates)
            .map(|chunk| {
                self.authorized_entities_in_chunk(chunk, &subject_chunks, permission, browse)
            })
            .collect();
        let per_chunk: Vec<Vec<Uuid>> = stream::iter(lookups)
            .buffer_unordered(self.chunk_concurrency)
            .try_collect()
            .await?;

        let authorized = batch::merge_unique(per_chunk);
        debug!(authorized = authorized.len(), "Resolved authorized entities");
        Ok(authorized)
    }

    async fn authorized_entities_in_chunk(
        &self,
        chunk: &[Uuid],
        subject_chunks: &[Vec<Subject>],
        permission: &str,
        browse: bool,
    ) -> Result<Vec<Uuid>, DomainError> {
        let entities = self.store.find_entities(chunk).await?;

        let mut authorized = Vec::new();
        let mut pending = Vec::new();
        for entity in entities {
            if browse && entity.is_public() {
                authorized.push(entity.uuid);
            } else {
                pending.push(entity.uuid);
            }
        }
        if pending.is_empty() {
            return Ok(authorized);
        }

        for subjects in subject_chunks {
            let filter = GrantFilter::new()
                .subjects(SubjectMatch::OneOf(subjects.clone()))
                .permission(permission)
                .scope(ScopeMatch::Entities(pending.clone()));
            let grants = self.store.find_grants(&filter).await?;
            authorized.extend(grants.into_iter().filter_map(|g| g.entity_uuid));
        }
        Ok(authorized)
    }

    /// Keeps the candidate users holding `permission` on `entity` through a
    /// direct grant or a group. `Anyone` grants do not count here.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn keep_authorized_users_for_entity(
        &self,
        candidates: &[Uuid],
        permission: &str,
        entity: Uuid,
    ) -> Result<HashSet<Uuid>, DomainError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let Some(entity) = self.find_entity(entity).await? else {
            debug!("Entity not found, nobody is authorized");
            return Ok(HashSet::new());
        };
        let candidates = batch::distinct(candidates);

        let access = if permission::is_browse(permission) && entity.is_public() {
            UserAccess::AnyExistingUser
        } else {
            let filter = GrantFilter::new()
                .subjects(SubjectMatch::Kind(SubjectKind::Group))
                .permission(permission)
                .scope(ScopeMatch::Entity(entity.uuid));
            let groups: Vec<Uuid> = self
                .store
                .find_grants(&filter)
                .await?
                .iter()
                .filter_map(|g| g.subject.uuid())
                .collect();
            UserAccess::Granted {
                groups: batch::distinct(&groups),
            }
        };

        let lookups: Vec<_> = self
            .batcher
            .chunks(&candidates)
            .map(|chunk| self.authorized_users_in_chunk(chunk, permission, entity.uuid, &access))
            .collect();
        let per_chunk: Vec<Vec<Uuid>> = stream::iter(lookups)
            .buffer_unordered(self.chunk_concurrency)
            .try_collect()
            .await?;

        Ok(batch::merge_unique(per_chunk))
    }

    async fn authorized_users_in_chunk(
        &self,
        chunk: &[Uuid],
        permission: &str,
        entity: Uuid,
        access: &UserAccess,
    ) -> Result<Vec<Uuid>, DomainError> {
        let groups = match access {
            UserAccess::AnyExistingUser => return Ok(self.store.existing_users(chunk).await?),
            UserAccess::Granted { groups } => groups,
        };

        let filter = GrantFilter::new()
            .subjects(SubjectMatch::OneOf(
                chunk.iter().copied().map(Subject::User).collect(),
            ))
            .permission(permission)
            .scope(ScopeMatch::Entity(entity));
        let mut authorized: Vec<Uuid> = self
            .store
            .find_grants(&filter)
            .await?
            .iter()
            .filter_map(|g| g.subject.uuid())
            .collect();

        for group_chunk in self.batcher.chunks(groups) {
            let filter = MembershipFilter::in_groups(group_chunk.to_vec()).users(chunk.to_vec());
            let members = self.store.find_memberships(&filter).await?;
            authorized.extend(members.iter().map(|m| m.user_uuid));
        }
        Ok(authorized)
    }

    /// Union of `Anyone`, direct and group grants of `user`, on `entity` or
    /// globally when `entity` is `None`.
    ///
    /// Public visibility adds nothing here; only stored grants are reported.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn select_effective_permissions(
        &self,
        entity: Option<Uuid>,
        user: Option<Uuid>,
    ) -> Result<BTreeSet<String>, DomainError> {
        let scope = match entity {
            None => ScopeMatch::Global,
            Some(uuid) => {
                if self.find_entity(uuid).await?.is_none() {
                    return Ok(BTreeSet::new());
                }
                ScopeMatch::Entity(uuid)
            }
        };
        let subjects = self.subjects_of(user).await?;

        let mut permissions = BTreeSet::new();
        for chunk in self.batcher.chunks(&subjects) {
            let filter = GrantFilter::new()
                .subjects(SubjectMatch::OneOf(chunk.to_vec()))
                .scope(scope.clone());
            let grants = self.store.find_grants(&filter).await?;
            permissions.extend(grants.into_iter().map(|g| g.permission));
        }
        Ok(permissions)
    }

    /// Distinct users holding `permission` globally while one group grant,
    /// one membership or one whole user is treated as absent.
    ///
    /// Used to refuse removing the last administrator.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn count_users_with_global_permission_excluding(
        &self,
        permission: &str,
        excluded_group: Option<Uuid>,
        excluded_user: Option<Uuid>,
    ) -> Result<u64, DomainError> {
        let exclusion = GlobalPermissionExclusion::from_parts(excluded_group, excluded_user);
        let holders = self.global_permission_holders(permission, exclusion).await?;
        Ok(holders.len() as u64)
    }

    /// Like [`Self::count_users_with_global_permission_excluding`], but only
    /// the direct grant of `user` is ignored. Its group paths still count.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn count_users_with_global_permission_excluding_user_permission(
        &self,
        permission: &str,
        user: Uuid,
    ) -> Result<u64, DomainError> {
        let exclusion = GlobalPermissionExclusion::UserGrant(user);
        let holders = self.global_permission_holders(permission, exclusion).await?;
        Ok(holders.len() as u64)
    }

    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn select_user_uuids_with_global_permission(
        &self,
        permission: &str,
    ) -> Result<HashSet<Uuid>, DomainError> {
        self.global_permission_holders(permission, GlobalPermissionExclusion::Nothing)
            .await
    }

    async fn global_permission_holders(
        &self,
        permission: &str,
        exclusion: GlobalPermissionExclusion,
    ) -> Result<HashSet<Uuid>, DomainError> {
        let filter = GrantFilter::new()
            .permission(permission)
            .scope(ScopeMatch::Global);
        let grants = self.store.find_grants(&filter).await?;

        let mut direct = Vec::new();
        let mut groups = Vec::new();
        for grant in grants {
            match grant.subject {
                Subject::User(user) if !exclusion.skips_user_grant(user) => direct.push(user),
                Subject::Group(group) if !exclusion.skips_group(group) => groups.push(group),
                _ => {}
            }
        }

        let mut holders = HashSet::new();
        for chunk in self.batcher.chunks(&batch::distinct(&direct)) {
            holders.extend(self.store.existing_users(chunk).await?);
        }
        for chunk in self.batcher.chunks(&batch::distinct(&groups)) {
            let members = self
                .store
                .find_memberships(&MembershipFilter::in_groups(chunk.to_vec()))
                .await?;
            holders.extend(
                members
                    .into_iter()
                    .filter(|m| !exclusion.skips_membership(*m))
                    .map(|m| m.user_uuid),
            );
        }
        holders.retain(|user| !exclusion.removes_user(*user));
        debug!(holders = holders.len(), ?exclusion, "Counted global permission holders");
        Ok(holders)
    }

    /// Global grants held by `subject` itself, without group expansion.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn select_global_permissions_of_subject(
        &self,
        subject: Subject,
    ) -> Result<BTreeSet<String>, DomainError> {
        let filter = GrantFilter::new()
            .subject(subject)
            .scope(ScopeMatch::Global);
        let grants = self.store.find_grants(&filter).await?;
        Ok(grants.into_iter().map(|g| g.permission).collect())
    }

    /// Grants held by `subject` itself on `entity`, without group expansion.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn select_entity_permissions_of_subject(
        &self,
        subject: Subject,
        entity: Uuid,
    ) -> Result<BTreeSet<String>, DomainError> {
        if self.find_entity(entity).await?.is_none() {
            return Ok(BTreeSet::new());
        }
        let filter = GrantFilter::new()
            .subject(subject)
            .scope(ScopeMatch::Entity(entity));
        let grants = self.store.find_grants(&filter).await?;
        Ok(grants.into_iter().map(|g| g.permission).collect())
    }

    /// Groups holding at least one permission on `entity`, none of which is
    /// `permission`.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn select_group_uuids_with_permission_on_entity_but(
        &self,
        entity: Uuid,
        permission: &str,
    ) -> Result<HashSet<Uuid>, DomainError> {
        if self.find_entity(entity).await?.is_none() {
            return Ok(HashSet::new());
        }
        let filter = GrantFilter::new()
            .subjects(SubjectMatch::Kind(SubjectKind::Group))
            .scope(ScopeMatch::Entity(entity));

        let mut by_group: BTreeMap<Uuid, bool> = BTreeMap::new();
        for grant in self.store.find_grants(&filter).await? {
            if let Some(group) = grant.subject.uuid() {
                let holds = by_group.entry(group).or_default();
                *holds |= grant.permission == permission;
            }
        }
        Ok(by_group
            .into_iter()
            .filter_map(|(group, holds)| (!holds).then_some(group))
            .collect())
    }

    /// Keys of existing entities with at least one `Anyone` grant, sorted
    /// ascending and capped at `limit`. Global `Anyone` grants are ignored.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn select_entity_keys_with_anyone_permissions(
        &self,
        limit: usize,
    ) -> Result<Vec<String>, DomainError> {
        let mut keys: Vec<String> = self
            .entities_with_anyone_grants()
            .await?
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.sort_unstable();
        keys.truncate(limit);
        Ok(keys)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn count_entities_with_anyone_permissions(&self) -> Result<u64, DomainError> {
        Ok(self.entities_with_anyone_grants().await?.len() as u64)
    }

    async fn entities_with_anyone_grants(&self) -> Result<Vec<Entity>, DomainError> {
        let filter = GrantFilter::new()
            .subjects(SubjectMatch::Kind(SubjectKind::Anyone))
            .scope(ScopeMatch::AnyEntity);
        let uuids: Vec<Uuid> = self
            .store
            .find_grants(&filter)
            .await?
            .iter()
            .filter_map(|g| g.entity_uuid)
            .collect();

        let mut entities = Vec::new();
        for chunk in self.batcher.chunks(&batch::distinct(&uuids)) {
            entities.extend(self.store.find_entities(chunk).await?);
        }
        Ok(entities)
    }

    /// Subjects whose grants `user` inherits. Always includes `Anyone`.
    async fn subjects_of(&self, user: Option<Uuid>) -> Result<Vec<Subject>, DomainError> {
        let mut subjects = vec![Subject::Anyone];
        if let Some(user) = user {
            subjects.push(Subject::User(user));
            let groups = self.store.group_uuids_of_user(user).await?;
            subjects.extend(groups.into_iter().map(Subject::Group));
        }
        Ok(subjects)
    }

    async fn find_entity(&self, uuid: Uuid) -> Result<Option<Entity>, DomainError> {
        Ok(self.store.find_entities(&[uuid]).await?.into_iter().next())
    }
}
