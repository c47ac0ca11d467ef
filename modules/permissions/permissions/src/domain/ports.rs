use async_trait::async_trait;
use permissions_sdk::{ActorContext, DefaultTemplates, PermissionTemplate};
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::events::GrantAuditEvent;
use crate::domain::store::WriteOutcome;

/// Output port: receives one event per grant row changed, after commit.
/// Fire-and-forget; a sink must not fail the mutation.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &GrantAuditEvent);

    /// Records removals first, then insertions.
    fn record_outcome(&self, actor: ActorContext, outcome: WriteOutcome) {
        for grant in outcome.deleted {
            self.record(&GrantAuditEvent::removed(actor, grant));
        }
        for grant in outcome.inserted {
            self.record(&GrantAuditEvent::added(actor, grant));
        }
    }
}

/// Read-only view over permission templates, owned by template management.
#[async_trait]
pub trait TemplateReadModel: Send + Sync {
    async fn find_template(&self, uuid: Uuid) -> Result<Option<PermissionTemplate>, StoreError>;

    async fn list_templates(&self) -> Result<Vec<PermissionTemplate>, StoreError>;

    async fn default_templates(&self) -> Result<DefaultTemplates, StoreError>;
}
