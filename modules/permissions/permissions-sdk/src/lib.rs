#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Permissions SDK
//!
//! Public surface of the permissions module:
//!
//! - [`PermissionsClientV1`] - API trait for consumers
//! - [`Subject`], [`PermissionGrant`], [`Entity`] - ACL model
//! - [`PermissionTemplate`], [`DefaultTemplates`] - template model
//! - [`PermissionsError`] - error type
//!
//! ## Usage
//!
//! ```ignore
//! use permissions_sdk::{PermissionsClientV1, permission};
//!
//! let visible = client
//!     .keep_authorized_entities(&project_uuids, Some(user_uuid), permission::USER)
//!     .await?;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::PermissionsClientV1;
pub use error::PermissionsError;
pub use models::{
    ActorContext, DefaultTemplates, Entity, EntityQualifier, PermissionGrant, PermissionTemplate,
    Subject, SubjectKind, TemplateGrant, TemplateSubject, Visibility, permission,
};
