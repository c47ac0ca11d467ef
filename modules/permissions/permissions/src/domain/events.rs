use permissions_sdk::{ActorContext, PermissionGrant};

/// One grant row changed by a committed mutation.
///
/// `before` is set for removals, `after` for insertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantAuditEvent {
    pub before: Option<PermissionGrant>,
    pub after: Option<PermissionGrant>,
    pub actor: ActorContext,
}

impl GrantAuditEvent {
    #[must_use]
    pub fn added(actor: ActorContext, grant: PermissionGrant) -> Self {
        Self {
            before: None,
            after: Some(grant),
            actor,
        }
    }

    #[must_use]
    pub fn removed(actor: ActorContext, grant: PermissionGrant) -> Self {
        Self {
            before: Some(grant),
            after: None,
            actor,
        }
    }
}
