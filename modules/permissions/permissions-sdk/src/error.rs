//! Error types for the permissions module.

use thiserror::Error;
use uuid::Uuid;

use crate::models::EntityQualifier;

/// Errors returned by [`PermissionsClientV1`](crate::PermissionsClientV1).
///
/// Absence is never an error for queries or deletions: an unknown entity,
/// user or group resolves to an empty result or a zero count.
#[derive(Debug, Error)]
pub enum PermissionsError {
    /// The referenced permission template does not exist.
    #[error("permission template not found: {0}")]
    TemplateNotFound(Uuid),

    /// The entity a template was applied to does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(Uuid),

    /// No template applies to a new entity of this qualifier.
    #[error("no default permission template for {0:?}")]
    NoDefaultTemplate(EntityQualifier),

    /// More than one template key pattern matches a new entity's key.
    #[error("The \"{key}\" key matches multiple permission templates: {}.", quoted(.templates))]
    TemplateMatchingKey { key: String, templates: Vec<String> },

    /// The backing store failed; the operation had no effect.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
