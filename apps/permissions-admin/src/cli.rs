use std::path::PathBuf;

use clap::{Parser, Subcommand};
use permissions_sdk::{EntityQualifier, Subject, Visibility};
use uuid::Uuid;

/// Permissions store administration
#[derive(Parser, Debug)]
#[command(name = "permissions-admin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of configuration
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations and exit
    Migrate,

    /// Register a user
    AddUser { uuid: Uuid, login: String },

    /// Register a group
    AddGroup { uuid: Uuid, name: String },

    /// Add a user to a group
    AddMember { group: Uuid, user: Uuid },

    /// Register a project, application or portfolio
    AddEntity {
        uuid: Uuid,
        key: String,
        #[arg(long, value_parser = parse_qualifier, default_value = "TRK")]
        qualifier: EntityQualifier,
        #[arg(long)]
        public: bool,
    },

    /// Change the visibility of an entity
    SetVisibility {
        entity: Uuid,
        #[arg(value_parser = parse_visibility)]
        visibility: Visibility,
    },

    /// Grant a permission, globally or on an entity
    Grant(GrantArgs),

    /// Revoke a permission, globally or on an entity
    Revoke(GrantArgs),

    /// Revoke every grant on an entity
    RevokeEntity { entity: Uuid },

    /// Revoke every grant of a subject
    RevokeSubject {
        #[arg(value_parser = parse_subject)]
        subject: Subject,
    },

    /// Print the effective permissions of a user
    Effective {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        entity: Option<Uuid>,
    },

    /// Print the candidate entities on which a user holds a permission
    KeepEntities {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        permission: String,
        #[arg(required = true)]
        entities: Vec<Uuid>,
    },

    /// Print the candidate users holding a permission on an entity
    KeepUsers {
        #[arg(long)]
        entity: Uuid,
        #[arg(long)]
        permission: String,
        #[arg(required = true)]
        users: Vec<Uuid>,
    },

    /// Count holders of a global permission, ignoring one group, membership or user
    CountHolders {
        permission: String,
        #[arg(long)]
        excluded_group: Option<Uuid>,
        #[arg(long)]
        excluded_user: Option<Uuid>,
        /// Ignore only the direct grant of the excluded user
        #[arg(long, requires = "excluded_user", conflicts_with = "excluded_group")]
        direct_grant_only: bool,
    },

    /// Replace the permissions of an entity with a template
    ApplyTemplate { template: Uuid, entity: Uuid },

    /// Apply the default template to a newly created entity
    ApplyDefault {
        entity: Uuid,
        #[arg(long)]
        creator: Option<Uuid>,
    },
}

#[derive(clap::Args, Debug)]
pub struct GrantArgs {
    /// `anyone`, `user:<uuid>` or `group:<uuid>`
    #[arg(value_parser = parse_subject)]
    pub subject: Subject,
    pub permission: String,
    /// Omit for a global permission
    #[arg(long)]
    pub entity: Option<Uuid>,
}

pub fn parse_subject(raw: &str) -> Result<Subject, String> {
    if raw == "anyone" {
        return Ok(Subject::Anyone);
    }
    let (kind, uuid) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected anyone, user:<uuid> or group:<uuid>, got '{raw}'"))?;
    let uuid = Uuid::parse_str(uuid).map_err(|e| format!("invalid uuid '{uuid}': {e}"))?;
    match kind {
        "user" => Ok(Subject::User(uuid)),
        "group" => Ok(Subject::Group(uuid)),
        other => Err(format!("unknown subject kind '{other}'")),
    }
}

fn parse_qualifier(raw: &str) -> Result<EntityQualifier, String> {
    EntityQualifier::from_code(raw).ok_or_else(|| format!("unknown qualifier '{raw}'"))
}

fn parse_visibility(raw: &str) -> Result<Visibility, String> {
    match raw {
        "public" => Ok(Visibility::Public),
        "private" => Ok(Visibility::Private),
        other => Err(format!("expected public or private, got '{other}'")),
    }
}
