use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use permissions_sdk::{
    ActorContext, Entity, EntityQualifier, PermissionGrant, PermissionTemplate, Subject,
    TemplateSubject, permission,
};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::batch::Batcher;
use crate::domain::error::DomainError;
use crate::domain::ports::{AuditSink, TemplateReadModel};
use crate::domain::store::{GrantFilter, GrantWrite, PermissionStore, ScopeMatch};

/// Replaces entity ACLs with the grants of a permission template.
pub struct TemplateService<S: PermissionStore> {
    store: Arc<S>,
    templates: Arc<dyn TemplateReadModel>,
    audit: Arc<dyn AuditSink>,
    batcher: Batcher,
}

impl<S: PermissionStore> TemplateService<S> {
    pub fn new(
        store: Arc<S>,
        templates: Arc<dyn TemplateReadModel>,
        audit: Arc<dyn AuditSink>,
        batcher: Batcher,
    ) -> Self {
        Self {
            store,
            templates,
            audit,
            batcher,
        }
    }

    /// Replaces every entity-scoped grant on `entity` with the grants of
    /// `template`, in one transaction.
    ///
    /// # Errors
    /// `TemplateNotFound` / `EntityNotFound` before anything is written;
    /// `Storage` if the write fails, in which case nothing changed.
    #[instrument(skip(self, actor))]
    pub async fn apply(
        &self,
        actor: ActorContext,
        template: Uuid,
        entity: Uuid,
    ) -> Result<(), DomainError> {
        let template = self
            .templates
            .find_template(template)
            .await?
            .ok_or_else(|| DomainError::template_not_found(template))?;
        let entity = self.load_entity(entity).await?;
        self.replace_grants(actor, &template, &entity, None).await
    }

    /// Applies the template selected for a newly created entity: the one
    /// whose key pattern matches the entity key, otherwise the default for
    /// the entity's qualifier. `ProjectCreator` grants go to `creator`.
    ///
    /// # Errors
    /// `TemplateMatchingKey` when several key patterns match,
    /// `NoDefaultTemplate` when no template applies, plus the errors of
    /// [`apply`](Self::apply).
    #[instrument(skip(self, actor))]
    pub async fn apply_default_to_new_entity(
        &self,
        actor: ActorContext,
        entity: Uuid,
        creator: Option<Uuid>,
    ) -> Result<(), DomainError> {
        let entity = self.load_entity(entity).await?;
        let template = self
            .default_template_for(&entity.key, entity.qualifier)
            .await?
            .ok_or(DomainError::NoDefaultTemplate {
                qualifier: entity.qualifier,
            })?;
        self.replace_grants(actor, &template, &entity, creator).await
    }

    /// Whether `user` would be able to push analyses to a project created
    /// with `entity_key`, judging by the template that would be applied.
    ///
    /// # Errors
    /// `TemplateMatchingKey` when several key patterns match; store failures.
    #[instrument(skip(self))]
    pub async fn would_user_have_scan_permission_with_default_template(
        &self,
        user: Option<Uuid>,
        entity_key: &str,
    ) -> Result<bool, DomainError> {
        let Some(template) = self
            .default_template_for(entity_key, EntityQualifier::Project)
            .await?
        else {
            return Ok(false);
        };

        let groups: HashSet<Uuid> = match user {
            Some(user) => self.store.group_uuids_of_user(user).await?.into_iter().collect(),
            None => HashSet::new(),
        };
        let potential: BTreeSet<&str> = template
            .grants
            .iter()
            .filter(|g| match g.subject {
                TemplateSubject::Anyone => true,
                TemplateSubject::User(uuid) => user == Some(uuid),
                TemplateSubject::Group(uuid) => groups.contains(&uuid),
                TemplateSubject::ProjectCreator => user.is_some(),
            })
            .map(|g| g.permission.as_str())
            .collect();
        Ok(potential.contains(permission::SCAN))
    }

    async fn default_template_for(
        &self,
        key: &str,
        qualifier: EntityQualifier,
    ) -> Result<Option<PermissionTemplate>, DomainError> {
        let mut matching: Vec<PermissionTemplate> = self
            .templates
            .list_templates()
            .await?
            .into_iter()
            .filter(|t| key_pattern_matches(t, key))
            .collect();
        if matching.len() > 1 {
            let mut templates: Vec<String> = matching.into_iter().map(|t| t.name).collect();
            templates.sort_by_key(|name| name.to_lowercase());
            return Err(DomainError::TemplateMatchingKey {
                key: key.to_owned(),
                templates,
            });
        }
        if let Some(template) = matching.pop() {
            debug!(template = %template.name, "Template selected by key pattern");
            return Ok(Some(template));
        }

        let Some(uuid) = self
            .templates
            .default_templates()
            .await?
            .for_qualifier(qualifier)
        else {
            return Ok(None);
        };
        let template = self.templates.find_template(uuid).await?;
        if template.is_none() {
            warn!(template = %uuid, "Default template does not exist");
        }
        Ok(template)
    }

    async fn replace_grants(
        &self,
        actor: ActorContext,
        template: &PermissionTemplate,
        entity: &Entity,
        creator: Option<Uuid>,
    ) -> Result<(), DomainError> {
        let grants = self.resolve_grants(template, entity, creator).await?;

        let mut ops = Vec::with_capacity(grants.len() + 1);
        ops.push(GrantWrite::Delete(
            GrantFilter::new().scope(ScopeMatch::Entity(entity.uuid)),
        ));
        ops.extend(grants.into_iter().map(GrantWrite::Insert));

        let outcome = self.store.write(ops).await?.without_unchanged();
        info!(
            template = %template.name,
            entity = %entity.key,
            removed = outcome.deleted.len(),
            granted = outcome.inserted.len(),
            "Permission template applied"
        );
        self.audit.record_outcome(actor, outcome);
        Ok(())
    }

    /// Turns template grants into concrete grants on `entity`.
    ///
    /// Browse permissions are implicit on public entities and `Anyone` never
    /// gets anything on a private one. References to deleted users or groups
    /// are dropped.
    async fn resolve_grants(
        &self,
        template: &PermissionTemplate,
        entity: &Entity,
        creator: Option<Uuid>,
    ) -> Result<Vec<PermissionGrant>, DomainError> {
        let mut users = Vec::new();
        let mut groups = Vec::new();
        for grant in &template.grants {
            match grant.subject {
                TemplateSubject::User(uuid) => users.push(uuid),
                TemplateSubject::Group(uuid) => groups.push(uuid),
                TemplateSubject::Anyone | TemplateSubject::ProjectCreator => {}
            }
        }
        let mut existing_users = HashSet::new();
        for chunk in self.batcher.chunks(&users) {
            existing_users.extend(self.store.existing_users(chunk).await?);
        }
        let mut existing_groups = HashSet::new();
        for chunk in self.batcher.chunks(&groups) {
            existing_groups.extend(self.store.existing_groups(chunk).await?);
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for grant in &template.grants {
            if entity.is_public() && permission::is_browse(&grant.permission) {
                continue;
            }
            let subject = match grant.subject {
                TemplateSubject::Anyone if entity.is_public() => Subject::Anyone,
                TemplateSubject::User(uuid) if existing_users.contains(&uuid) => Subject::User(uuid),
                TemplateSubject::Group(uuid) if existing_groups.contains(&uuid) => {
                    Subject::Group(uuid)
                }
                TemplateSubject::ProjectCreator => match creator {
                    Some(uuid) => Subject::User(uuid),
                    None => continue,
                },
                _ => continue,
            };
            let resolved_grant =
                PermissionGrant::on_entity(subject, grant.permission.clone(), entity.uuid);
            if seen.insert(resolved_grant.clone()) {
                resolved.push(resolved_grant);
            }
        }
        Ok(resolved)
    }

    async fn load_entity(&self, uuid: Uuid) -> Result<Entity, DomainError> {
        self.store
            .find_entities(&[uuid])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::entity_not_found(uuid))
    }
}

/// Full-string match of the template key pattern. Templates without a
/// pattern, or with one that does not compile, never match.
fn key_pattern_matches(template: &PermissionTemplate, key: &str) -> bool {
    let Some(pattern) = template.key_pattern.as_deref().filter(|p| !p.is_empty()) else {
        return false;
    };
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => re.is_match(key),
        Err(e) => {
            warn!(template = %template.name, error = %e, "Ignoring invalid template key pattern");
            false
        }
    }
}
