//! Audit sinks.

use tracing::info;

use crate::domain::events::GrantAuditEvent;
use crate::domain::ports::AuditSink;

/// Writes each grant change to the `permissions::audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &GrantAuditEvent) {
        let actor = event
            .actor
            .user_uuid
            .map_or_else(|| "system".to_owned(), |u| u.to_string());
        match (&event.before, &event.after) {
            (_, Some(grant)) => info!(
                target: "permissions::audit",
                actor = %actor,
                subject = %grant.subject,
                permission = %grant.permission,
                entity = ?grant.entity_uuid,
                "grant added"
            ),
            (Some(grant), None) => info!(
                target: "permissions::audit",
                actor = %actor,
                subject = %grant.subject,
                permission = %grant.permission,
                entity = ?grant.entity_uuid,
                "grant removed"
            ),
            (None, None) => {}
        }
    }
}
