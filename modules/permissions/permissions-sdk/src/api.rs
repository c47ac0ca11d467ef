//! Public API trait for the permissions module.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PermissionsError;
use crate::models::{ActorContext, PermissionGrant, Subject};

/// Public API for the permissions module (version 1).
///
/// Queries are side-effect free. Every mutation commits atomically and
/// reports the number of grant rows it changed.
#[async_trait]
pub trait PermissionsClientV1: Send + Sync {
    /// Keeps the candidate entities on which `user` (or an anonymous caller
    /// when `None`) holds `permission`.
    async fn keep_authorized_entities(
        &self,
        candidates: &[Uuid],
        user: Option<Uuid>,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError>;

    /// Keeps the candidate users holding `permission` on `entity`, directly
    /// or through a group.
    async fn keep_authorized_users_for_entity(
        &self,
        candidates: &[Uuid],
        permission: &str,
        entity: Uuid,
    ) -> Result<HashSet<Uuid>, PermissionsError>;

    /// Everything `user` may do on `entity`, or globally when `entity` is `None`.
    async fn select_effective_permissions(
        &self,
        entity: Option<Uuid>,
        user: Option<Uuid>,
    ) -> Result<BTreeSet<String>, PermissionsError>;

    /// Counts distinct users holding a global permission while one group
    /// grant, one membership (group and user) or one whole user (user only)
    /// is treated as absent.
    async fn count_users_with_global_permission_excluding(
        &self,
        permission: &str,
        excluded_group: Option<Uuid>,
        excluded_user: Option<Uuid>,
    ) -> Result<u64, PermissionsError>;

    /// Counts distinct users holding a global permission, ignoring only the
    /// direct grant of `user`.
    async fn count_users_with_global_permission_excluding_user_permission(
        &self,
        permission: &str,
        user: Uuid,
    ) -> Result<u64, PermissionsError>;

    async fn select_user_uuids_with_global_permission(
        &self,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError>;

    /// Raw global grants of one subject, without group expansion.
    async fn select_global_permissions_of_subject(
        &self,
        subject: Subject,
    ) -> Result<BTreeSet<String>, PermissionsError>;

    /// Raw grants of one subject on one entity, without group expansion.
    async fn select_entity_permissions_of_subject(
        &self,
        subject: Subject,
        entity: Uuid,
    ) -> Result<BTreeSet<String>, PermissionsError>;

    /// Groups holding some permission on `entity` other than `permission`.
    async fn select_group_uuids_with_permission_on_entity_but(
        &self,
        entity: Uuid,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError>;

    /// Keys of entities carrying at least one `Anyone` grant, ascending.
    async fn select_entity_keys_with_anyone_permissions(
        &self,
        limit: usize,
    ) -> Result<Vec<String>, PermissionsError>;

    async fn count_entities_with_anyone_permissions(&self) -> Result<u64, PermissionsError>;

    async fn insert_grant(
        &self,
        actor: &ActorContext,
        grant: PermissionGrant,
    ) -> Result<(), PermissionsError>;

    async fn delete_grant(
        &self,
        actor: &ActorContext,
        subject: Subject,
        permission: &str,
        entity: Option<Uuid>,
    ) -> Result<u64, PermissionsError>;

    async fn delete_all_for_entity(
        &self,
        actor: &ActorContext,
        entity: Uuid,
    ) -> Result<u64, PermissionsError>;

    async fn delete_all_for_subject(
        &self,
        actor: &ActorContext,
        subject: Subject,
    ) -> Result<u64, PermissionsError>;

    async fn delete_all_for_entity_and_permission(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        permission: &str,
    ) -> Result<u64, PermissionsError>;

    async fn delete_all_for_entity_and_subject(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        subject: Subject,
    ) -> Result<u64, PermissionsError>;

    /// Replaces every entity-scoped grant of `entity` with the grants of `template`.
    async fn apply_template(
        &self,
        actor: &ActorContext,
        template: Uuid,
        entity: Uuid,
    ) -> Result<(), PermissionsError>;

    /// Applies the template selected for a freshly created entity.
    async fn apply_default_template(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        creator: Option<Uuid>,
    ) -> Result<(), PermissionsError>;

    async fn would_user_have_scan_permission_with_default_template(
        &self,
        user: Option<Uuid>,
        entity_key: &str,
    ) -> Result<bool, PermissionsError>;
}
