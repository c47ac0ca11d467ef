//! Domain service layer.
//!
//! - `resolver` - authorization questions (read-only)
//! - `mutator` - grant and revoke, with audit events
//! - `template_applier` - whole-ACL replacement from permission templates
//!
//! Services depend on the [`PermissionStore`] port only. The concrete store
//! is chosen by the composition root (the admin app, or tests).

use std::sync::Arc;

use crate::config::PermissionsConfig;
use crate::domain::batch::Batcher;
use crate::domain::ports::{AuditSink, TemplateReadModel};
use crate::domain::store::PermissionStore;

mod mutator;
mod resolver;
mod template_applier;

pub use mutator::MutatorService;
pub use resolver::{GlobalPermissionExclusion, ResolverService};
pub use template_applier::TemplateService;

#[cfg(test)]
mod tests_templates;

// DI container - aggregates the domain services over one store.
pub struct PermissionServices<S: PermissionStore> {
    pub resolver: Arc<ResolverService<S>>,
    pub mutator: Arc<MutatorService<S>>,
    pub templates: Arc<TemplateService<S>>,
}

impl<S: PermissionStore> PermissionServices<S> {
    pub fn new(
        store: Arc<S>,
        templates: Arc<dyn TemplateReadModel>,
        audit: Arc<dyn AuditSink>,
        config: &PermissionsConfig,
    ) -> Self {
        let batcher = Batcher::new(config.batch_size);
        Self {
            resolver: Arc::new(ResolverService::new(
                Arc::clone(&store),
                batcher,
                config.chunk_concurrency,
            )),
            mutator: Arc::new(MutatorService::new(Arc::clone(&store), Arc::clone(&audit))),
            templates: Arc::new(TemplateService::new(store, templates, audit, batcher)),
        }
    }
}
