//! Domain errors for the permissions module.

use permissions_sdk::{EntityQualifier, PermissionsError};
use uuid::Uuid;

/// Failure reported by a [`PermissionStore`](crate::domain::store::PermissionStore)
/// implementation. Carries no backend types so the domain stays storage-agnostic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Duplicate grant, grant on a missing entity and similar.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

impl StoreError {
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRow(message.into())
    }
}

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("permission template not found: {uuid}")]
    TemplateNotFound { uuid: Uuid },

    #[error("entity not found: {uuid}")]
    EntityNotFound { uuid: Uuid },

    /// No key pattern matched and no default template is configured for
    /// the qualifier, nor for projects.
    #[error("no default permission template for {qualifier:?}")]
    NoDefaultTemplate { qualifier: EntityQualifier },

    /// Several template key patterns match the key of a new entity.
    /// `templates` is sorted case-insensitively.
    #[error("key '{key}' matches multiple permission templates: {templates:?}")]
    TemplateMatchingKey { key: String, templates: Vec<String> },
}

impl DomainError {
    #[must_use]
    pub fn template_not_found(uuid: Uuid) -> Self {
        Self::TemplateNotFound { uuid }
    }

    #[must_use]
    pub fn entity_not_found(uuid: Uuid) -> Self {
        Self::EntityNotFound { uuid }
    }
}

impl From<DomainError> for PermissionsError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Storage(err) => Self::StorageFailure(err.to_string()),
            DomainError::TemplateNotFound { uuid } => Self::TemplateNotFound(uuid),
            DomainError::EntityNotFound { uuid } => Self::EntityNotFound(uuid),
            DomainError::NoDefaultTemplate { qualifier } => Self::NoDefaultTemplate(qualifier),
            DomainError::TemplateMatchingKey { key, templates } => {
                Self::TemplateMatchingKey { key, templates }
            }
        }
    }
}
