//! Grant model shared by the permissions module and its consumers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known permission names.
///
/// Any string is a valid permission; these are the ones the engine gives
/// special meaning to, plus the set used by the default templates.
pub mod permission {
    /// Browse an entity.
    pub const USER: &str = "user";
    /// Read the source code of an entity.
    pub const CODEVIEWER: &str = "codeviewer";
    pub const ISSUE_ADMIN: &str = "issueadmin";
    pub const SECURITY_HOTSPOT_ADMIN: &str = "securityhotspotadmin";
    /// Administer an entity, or the whole system when granted globally.
    pub const ADMIN: &str = "admin";
    /// Push analysis results.
    pub const SCAN: &str = "scan";
    pub const QUALITY_GATE_ADMIN: &str = "gateadmin";
    pub const QUALITY_PROFILE_ADMIN: &str = "profileadmin";
    pub const PROVISION_PROJECTS: &str = "provisioning";
    pub const APPLICATION_CREATOR: &str = "applicationcreator";
    pub const PORTFOLIO_CREATOR: &str = "portfoliocreator";

    /// Permissions implicitly held by everybody on a public entity.
    pub const BROWSE: [&str; 2] = [USER, CODEVIEWER];

    /// Returns `true` for `user` and `codeviewer`.
    #[inline]
    #[must_use]
    pub fn is_browse(permission: &str) -> bool {
        BROWSE.contains(&permission)
    }
}

/// Discriminant of a [`Subject`], as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    User,
    Group,
    Anyone,
}

impl SubjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Anyone => "anyone",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            "anyone" => Some(Self::Anyone),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The holder of a grant.
///
/// `Anyone` is the implicit group every identity belongs to, including
/// anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uuid", rename_all = "snake_case")]
pub enum Subject {
    User(Uuid),
    Group(Uuid),
    Anyone,
}

impl Subject {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::User(_) => SubjectKind::User,
            Self::Group(_) => SubjectKind::Group,
            Self::Anyone => SubjectKind::Anyone,
        }
    }

    /// The user or group uuid, `None` for `Anyone`.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::User(uuid) | Self::Group(uuid) => Some(*uuid),
            Self::Anyone => None,
        }
    }

    /// Rebuilds a subject from its persisted columns.
    #[must_use]
    pub fn from_parts(kind: SubjectKind, uuid: Option<Uuid>) -> Option<Self> {
        match (kind, uuid) {
            (SubjectKind::User, Some(uuid)) => Some(Self::User(uuid)),
            (SubjectKind::Group, Some(uuid)) => Some(Self::Group(uuid)),
            (SubjectKind::Anyone, None) => Some(Self::Anyone),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(uuid) => write!(f, "user:{uuid}"),
            Self::Group(uuid) => write!(f, "group:{uuid}"),
            Self::Anyone => f.write_str("anyone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    #[inline]
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// What kind of component an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityQualifier {
    Project,
    Application,
    Portfolio,
}

impl EntityQualifier {
    /// Short persisted code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Project => "TRK",
            Self::Application => "APP",
            Self::Portfolio => "VW",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TRK" => Some(Self::Project),
            "APP" => Some(Self::Application),
            "VW" => Some(Self::Portfolio),
            _ => None,
        }
    }
}

/// A permission-bearing resource: project, application or portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub uuid: Uuid,
    pub key: String,
    pub qualifier: EntityQualifier,
    pub visibility: Visibility,
}

impl Entity {
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }
}

/// One row of the ACL. `entity_uuid == None` means a global grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub subject: Subject,
    pub permission: String,
    pub entity_uuid: Option<Uuid>,
}

impl PermissionGrant {
    #[must_use]
    pub fn global(subject: Subject, permission: impl Into<String>) -> Self {
        Self {
            subject,
            permission: permission.into(),
            entity_uuid: None,
        }
    }

    #[must_use]
    pub fn on_entity(subject: Subject, permission: impl Into<String>, entity_uuid: Uuid) -> Self {
        Self {
            subject,
            permission: permission.into(),
            entity_uuid: Some(entity_uuid),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.entity_uuid.is_none()
    }
}

/// Holder of a template grant. `ProjectCreator` resolves to whoever creates
/// the entity the template is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uuid", rename_all = "snake_case")]
pub enum TemplateSubject {
    User(Uuid),
    Group(Uuid),
    Anyone,
    ProjectCreator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateGrant {
    pub subject: TemplateSubject,
    pub permission: String,
}

impl TemplateGrant {
    #[must_use]
    pub fn new(subject: TemplateSubject, permission: impl Into<String>) -> Self {
        Self {
            subject,
            permission: permission.into(),
        }
    }
}

/// A named, reusable set of grants applied to new or existing entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTemplate {
    pub uuid: Uuid,
    pub name: String,
    /// Regular expression matched against the whole entity key.
    pub key_pattern: Option<String>,
    pub grants: Vec<TemplateGrant>,
}

/// Default template per qualifier. Applications and portfolios fall back to
/// the project default when they have none of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTemplates {
    pub project: Option<Uuid>,
    pub application: Option<Uuid>,
    pub portfolio: Option<Uuid>,
}

impl DefaultTemplates {
    #[must_use]
    pub fn for_qualifier(&self, qualifier: EntityQualifier) -> Option<Uuid> {
        match qualifier {
            EntityQualifier::Project => self.project,
            EntityQualifier::Application => self.application.or(self.project),
            EntityQualifier::Portfolio => self.portfolio.or(self.project),
        }
    }
}

/// Identity performing a mutation, recorded on audit events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_uuid: Option<Uuid>,
}

impl ActorContext {
    /// Mutations not attributable to a user (migrations, housekeeping).
    #[must_use]
    pub fn system() -> Self {
        Self { user_uuid: None }
    }

    #[must_use]
    pub fn user(user_uuid: Uuid) -> Self {
        Self {
            user_uuid: Some(user_uuid),
        }
    }
}
