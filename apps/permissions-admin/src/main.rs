mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use permissions::domain::ports::TemplateReadModel;
use permissions::infra::audit::TracingAuditSink;
use permissions::infra::storage::SeaOrmPermissionStore;
use permissions::{PermissionServices, PermissionsLocalClient};
use permissions_sdk::{ActorContext, Entity, PermissionGrant, PermissionsClientV1, Visibility};
use serde_json::{Value, json};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command, GrantArgs};
use crate::config::{AppConfig, LoggingConfig};

type Client = PermissionsLocalClient<SeaOrmPermissionStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose)?;

    let store = SeaOrmPermissionStore::connect(
        &config.database.url,
        config.database.max_connections,
    )
    .await
    .with_context(|| format!("failed to open {}", config.database.url))?;
    store.migrate().await.context("schema migration failed")?;
    let store = Arc::new(store);

    let services = PermissionServices::new(
        Arc::clone(&store),
        Arc::clone(&store) as Arc<dyn TemplateReadModel>,
        Arc::new(TracingAuditSink),
        &config.permissions,
    );
    let client = PermissionsLocalClient::new(Arc::new(services));

    let output = execute(&store, &client, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else {
        EnvFilter::try_new(&logging.level)
            .with_context(|| format!("invalid log level '{}'", logging.level))?
    };
    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries the command output
    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

async fn execute(store: &SeaOrmPermissionStore, client: &Client, command: Command) -> Result<Value> {
    let value = match command {
        Command::Migrate => {
            tracing::info!("Schema is up to date");
            json!({ "migrated": true })
        }
        Command::AddUser { uuid, login } => {
            store.add_user(uuid, &login).await?;
            json!({ "user": uuid, "login": login })
        }
        Command::AddGroup { uuid, name } => {
            store.add_group(uuid, &name).await?;
            json!({ "group": uuid, "name": name })
        }
        Command::AddMember { group, user } => {
            store.add_member(group, user).await?;
            json!({ "group": group, "user": user })
        }
        Command::AddEntity {
            uuid,
            key,
            qualifier,
            public,
        } => {
            let visibility = if public {
                Visibility::Public
            } else {
                Visibility::Private
            };
            let entity = Entity {
                uuid,
                key,
                qualifier,
                visibility,
            };
            store.add_entity(&entity).await?;
            json!(entity)
        }
        Command::SetVisibility { entity, visibility } => {
            store.set_visibility(entity, visibility).await?;
            json!({ "entity": entity, "visibility": visibility })
        }
        other => run_client_command(client, other).await?,
    };
    Ok(value)
}

async fn run_client_command(client: &Client, command: Command) -> Result<Value> {
    let actor = ActorContext::system();
    let value = match command {
        Command::Grant(GrantArgs {
            subject,
            permission,
            entity,
        }) => {
            let grant = match entity {
                Some(entity) => PermissionGrant::on_entity(subject, permission, entity),
                None => PermissionGrant::global(subject, permission),
            };
            client.insert_grant(&actor, grant.clone()).await?;
            json!(grant)
        }
        Command::Revoke(GrantArgs {
            subject,
            permission,
            entity,
        }) => json!({ "deleted": client.delete_grant(&actor, subject, &permission, entity).await? }),
        Command::RevokeEntity { entity } => {
            json!({ "deleted": client.delete_all_for_entity(&actor, entity).await? })
        }
        Command::RevokeSubject { subject } => {
            json!({ "deleted": client.delete_all_for_subject(&actor, subject).await? })
        }
        Command::Effective { user, entity } => {
            json!(client.select_effective_permissions(entity, user).await?)
        }
        Command::KeepEntities {
            user,
            permission,
            entities,
        } => json!(
            client
                .keep_authorized_entities(&entities, user, &permission)
                .await?
        ),
        Command::KeepUsers {
            entity,
            permission,
            users,
        } => json!(
            client
                .keep_authorized_users_for_entity(&users, &permission, entity)
                .await?
        ),
        Command::CountHolders {
            permission,
            excluded_group,
            excluded_user,
            direct_grant_only,
        } => {
            let count = match excluded_user {
                Some(user) if direct_grant_only => {
                    client
                        .count_users_with_global_permission_excluding_user_permission(
                            &permission,
                            user,
                        )
                        .await?
                }
                _ => {
                    client
                        .count_users_with_global_permission_excluding(
                            &permission,
                            excluded_group,
                            excluded_user,
                        )
                        .await?
                }
            };
            json!({ "count": count })
        }
        Command::ApplyTemplate { template, entity } => {
            client.apply_template(&actor, template, entity).await?;
            json!({ "template": template, "entity": entity })
        }
        Command::ApplyDefault { entity, creator } => {
            client.apply_default_template(&actor, entity, creator).await?;
            json!({ "entity": entity, "creator": creator })
        }
        other => bail!("{other:?} does not go through the permissions client"),
    };
    Ok(value)
}
