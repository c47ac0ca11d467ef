use std::sync::Arc;

use permissions_sdk::{ActorContext, PermissionGrant, Subject};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::ports::AuditSink;
use crate::domain::store::{GrantFilter, GrantWrite, PermissionStore, ScopeMatch};

/// Grants and revokes permissions. Each call is one store transaction;
/// audit events go out only after it commits.
pub struct MutatorService<S: PermissionStore> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: PermissionStore> MutatorService<S> {
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// # Errors
    /// Returns `DomainError::Storage` when the grant already exists or
    /// references a missing entity.
    #[instrument(skip(self, actor, grant), fields(subject = %grant.subject, permission = %grant.permission))]
    pub async fn insert_grant(
        &self,
        actor: ActorContext,
        grant: PermissionGrant,
    ) -> Result<(), DomainError> {
        let outcome = self.store.write(vec![GrantWrite::Insert(grant)]).await?;
        info!("Permission granted");
        self.audit.record_outcome(actor, outcome);
        Ok(())
    }

    /// Removes one grant. Returns 0 when it did not exist.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, actor))]
    pub async fn delete_grant(
        &self,
        actor: ActorContext,
        subject: Subject,
        permission: &str,
        entity: Option<Uuid>,
    ) -> Result<u64, DomainError> {
        let scope = entity.map_or(ScopeMatch::Global, ScopeMatch::Entity);
        let filter = GrantFilter::new()
            .subject(subject)
            .permission(permission)
            .scope(scope);
        self.delete_matching(actor, filter).await
    }

    /// Removes every grant scoped to `entity`. Global grants are untouched.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, actor))]
    pub async fn delete_all_for_entity(
        &self,
        actor: ActorContext,
        entity: Uuid,
    ) -> Result<u64, DomainError> {
        let filter = GrantFilter::new().scope(ScopeMatch::Entity(entity));
        self.delete_matching(actor, filter).await
    }

    /// Removes every grant of `subject`, global and entity-scoped.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, actor))]
    pub async fn delete_all_for_subject(
        &self,
        actor: ActorContext,
        subject: Subject,
    ) -> Result<u64, DomainError> {
        self.delete_matching(actor, GrantFilter::new().subject(subject))
            .await
    }

    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, actor))]
    pub async fn delete_all_for_entity_and_permission(
        &self,
        actor: ActorContext,
        entity: Uuid,
        permission: &str,
    ) -> Result<u64, DomainError> {
        let filter = GrantFilter::new()
            .permission(permission)
            .scope(ScopeMatch::Entity(entity));
        self.delete_matching(actor, filter).await
    }

    /// Removes every permission `subject` holds on `entity`.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(skip(self, actor))]
    pub async fn delete_all_for_entity_and_subject(
        &self,
        actor: ActorContext,
        entity: Uuid,
        subject: Subject,
    ) -> Result<u64, DomainError> {
        let filter = GrantFilter::new()
            .subject(subject)
            .scope(ScopeMatch::Entity(entity));
        self.delete_matching(actor, filter).await
    }

    async fn delete_matching(
        &self,
        actor: ActorContext,
        filter: GrantFilter,
    ) -> Result<u64, DomainError> {
        let outcome = self.store.write(vec![GrantWrite::Delete(filter)]).await?;
        let deleted = outcome.deleted_count();
        if deleted == 0 {
            debug!("No grant matched, nothing deleted");
            return Ok(0);
        }
        info!(deleted, "Permissions revoked");
        self.audit.record_outcome(actor, outcome);
        Ok(deleted)
    }
}
