//! Local (in-process) client for the permissions module.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use permissions_sdk::{
    ActorContext, PermissionGrant, PermissionsClientV1, PermissionsError, Subject,
};
use uuid::Uuid;

use super::DomainError;
use super::service::PermissionServices;
use super::store::PermissionStore;

/// Local client wrapping the domain services.
pub struct PermissionsLocalClient<S: PermissionStore> {
    services: Arc<PermissionServices<S>>,
}

impl<S: PermissionStore> PermissionsLocalClient<S> {
    #[must_use]
    pub fn new(services: Arc<PermissionServices<S>>) -> Self {
        Self { services }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> PermissionsError {
    tracing::error!(operation = op, error = ?e, "permissions call failed");
    e.into()
}

#[async_trait]
impl<S: PermissionStore + 'static> PermissionsClientV1 for PermissionsLocalClient<S> {
    async fn keep_authorized_entities(
        &self,
        candidates: &[Uuid],
        user: Option<Uuid>,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError> {
        self.services
            .resolver
            .keep_authorized_entities(candidates, user, permission)
            .await
            .map_err(|e| log_and_convert("keep_authorized_entities", e))
    }

    async fn keep_authorized_users_for_entity(
        &self,
        candidates: &[Uuid],
        permission: &str,
        entity: Uuid,
    ) -> Result<HashSet<Uuid>, PermissionsError> {
        self.services
            .resolver
            .keep_authorized_users_for_entity(candidates, permission, entity)
            .await
            .map_err(|e| log_and_convert("keep_authorized_users_for_entity", e))
    }

    async fn select_effective_permissions(
        &self,
        entity: Option<Uuid>,
        user: Option<Uuid>,
    ) -> Result<BTreeSet<String>, PermissionsError> {
        self.services
            .resolver
            .select_effective_permissions(entity, user)
            .await
            .map_err(|e| log_and_convert("select_effective_permissions", e))
    }

    async fn count_users_with_global_permission_excluding(
        &self,
        permission: &str,
        excluded_group: Option<Uuid>,
        excluded_user: Option<Uuid>,
    ) -> Result<u64, PermissionsError> {
        self.services
            .resolver
            .count_users_with_global_permission_excluding(permission, excluded_group, excluded_user)
            .await
            .map_err(|e| log_and_convert("count_users_with_global_permission_excluding", e))
    }

    async fn count_users_with_global_permission_excluding_user_permission(
        &self,
        permission: &str,
        user: Uuid,
    ) -> Result<u64, PermissionsError> {
        self.services
            .resolver
            .count_users_with_global_permission_excluding_user_permission(permission, user)
            .await
            .map_err(|e| {
                log_and_convert("count_users_with_global_permission_excluding_user_permission", e)
            })
    }

    async fn select_user_uuids_with_global_permission(
        &self,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError> {
        self.services
            .resolver
            .select_user_uuids_with_global_permission(permission)
            .await
            .map_err(|e| log_and_convert("select_user_uuids_with_global_permission", e))
    }

    async fn select_global_permissions_of_subject(
        &self,
        subject: Subject,
    ) -> Result<BTreeSet<String>, PermissionsError> {
        self.services
            .resolver
            .select_global_permissions_of_subject(subject)
            .await
            .map_err(|e| log_and_convert("select_global_permissions_of_subject", e))
    }

    async fn select_entity_permissions_of_subject(
        &self,
        subject: Subject,
        entity: Uuid,
    ) -> Result<BTreeSet<String>, PermissionsError> {
        self.services
            .resolver
            .select_entity_permissions_of_subject(subject, entity)
            .await
            .map_err(|e| log_and_convert("select_entity_permissions_of_subject", e))
    }

    async fn select_group_uuids_with_permission_on_entity_but(
        &self,
        entity: Uuid,
        permission: &str,
    ) -> Result<HashSet<Uuid>, PermissionsError> {
        self.services
            .resolver
            .select_group_uuids_with_permission_on_entity_but(entity, permission)
            .await
            .map_err(|e| log_and_convert("select_group_uuids_with_permission_on_entity_but", e))
    }

    async fn select_entity_keys_with_anyone_permissions(
        &self,
        limit: usize,
    ) -> Result<Vec<String>, PermissionsError> {
        self.services
            .resolver
            .select_entity_keys_with_anyone_permissions(limit)
            .await
            .map_err(|e| log_and_convert("select_entity_keys_with_anyone_permissions", e))
    }

    async fn count_entities_with_anyone_permissions(&self) -> Result<u64, PermissionsError> {
        self.services
            .resolver
            .count_entities_with_anyone_permissions()
            .await
            .map_err(|e| log_and_convert("count_entities_with_anyone_permissions", e))
    }

    async fn insert_grant(
        &self,
        actor: &ActorContext,
        grant: PermissionGrant,
    ) -> Result<(), PermissionsError> {
        self.services
            .mutator
            .insert_grant(*actor, grant)
            .await
            .map_err(|e| log_and_convert("insert_grant", e))
    }

    async fn delete_grant(
        &self,
        actor: &ActorContext,
        subject: Subject,
        permission: &str,
        entity: Option<Uuid>,
    ) -> Result<u64, PermissionsError> {
        self.services
            .mutator
            .delete_grant(*actor, subject, permission, entity)
            .await
            .map_err(|e| log_and_convert("delete_grant", e))
    }

    async fn delete_all_for_entity(
        &self,
        actor: &ActorContext,
        entity: Uuid,
    ) -> Result<u64, PermissionsError> {
        self.services
            .mutator
            .delete_all_for_entity(*actor, entity)
            .await
            .map_err(|e| log_and_convert("delete_all_for_entity", e))
    }

    async fn delete_all_for_subject(
        &self,
        actor: &ActorContext,
        subject: Subject,
    ) -> Result<u64, PermissionsError> {
        self.services
            .mutator
            .delete_all_for_subject(*actor, subject)
            .await
            .map_err(|e| log_and_convert("delete_all_for_subject", e))
    }

    async fn delete_all_for_entity_and_permission(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        permission: &str,
    ) -> Result<u64, PermissionsError> {
        self.services
            .mutator
            .delete_all_for_entity_and_permission(*actor, entity, permission)
            .await
            .map_err(|e| log_and_convert("delete_all_for_entity_and_permission", e))
    }

    async fn delete_all_for_entity_and_subject(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        subject: Subject,
    ) -> Result<u64, PermissionsError> {
        self.services
            .mutator
            .delete_all_for_entity_and_subject(*actor, entity, subject)
            .await
            .map_err(|e| log_and_convert("delete_all_for_entity_and_subject", e))
    }

    async fn apply_template(
        &self,
        actor: &ActorContext,
        template: Uuid,
        entity: Uuid,
    ) -> Result<(), PermissionsError> {
        self.services
            .templates
            .apply(*actor, template, entity)
            .await
            .map_err(|e| log_and_convert("apply_template", e))
    }

    async fn apply_default_template(
        &self,
        actor: &ActorContext,
        entity: Uuid,
        creator: Option<Uuid>,
    ) -> Result<(), PermissionsError> {
        self.services
            .templates
            .apply_default_to_new_entity(*actor, entity, creator)
            .await
            .map_err(|e| log_and_convert("apply_default_template", e))
    }

    async fn would_user_have_scan_permission_with_default_template(
        &self,
        user: Option<Uuid>,
        entity_key: &str,
    ) -> Result<bool, PermissionsError> {
        self.services
            .templates
            .would_user_have_scan_permission_with_default_template(user, entity_key)
            .await
            .map_err(|e| {
                log_and_convert("would_user_have_scan_permission_with_default_template", e)
            })
    }
}
