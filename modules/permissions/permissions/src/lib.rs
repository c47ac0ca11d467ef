//! Permissions Module
//!
//! Resolves, grants, revokes and templates permissions on projects,
//! applications and portfolios.
//!
//! ## Architecture
//!
//! ### Contract Layer (`permissions-sdk`)
//! - `PermissionsClientV1` trait, ACL and template models, `PermissionsError`
//!
//! ### Domain Layer (`permissions::domain`)
//! - `service/` - resolver, mutator and template applier
//! - `store.rs` - the `PermissionStore` port and its filters
//! - `batch.rs` - chunking of large id lists
//! - `ports.rs` - audit sink and template read model
//! - **Rule:** MUST NOT import `infra::*`
//!
//! ### Infrastructure Layer (`permissions::infra`)
//! - `storage/` - `SeaORM` entities, migrations and store, plus an
//!   in-memory store
//! - `audit.rs` - tracing-backed audit sink
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === PUBLIC API (from SDK) ===
pub use permissions_sdk::{
    ActorContext, DefaultTemplates, Entity, EntityQualifier, PermissionGrant, PermissionTemplate,
    PermissionsClientV1, PermissionsError, Subject, SubjectKind, TemplateGrant, TemplateSubject,
    Visibility, permission,
};

pub use config::PermissionsConfig;
pub use domain::local_client::PermissionsLocalClient;
pub use domain::service::PermissionServices;

pub mod config;

// === INTERNAL MODULES ===
// Exposed for the admin app and integration tests. Use the SDK types for
// stable APIs.
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;
