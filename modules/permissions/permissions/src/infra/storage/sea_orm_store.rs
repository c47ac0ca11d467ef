//! `SeaORM`-backed [`PermissionStore`] and [`TemplateReadModel`].

use std::collections::HashMap;

use async_trait::async_trait;
use permissions_sdk::{
    DefaultTemplates, Entity, EntityQualifier, PermissionGrant, PermissionTemplate, Subject,
    TemplateGrant, Visibility,
};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::error::StoreError;
use crate::domain::ports::TemplateReadModel;
use crate::domain::store::{
    GrantFilter, GrantWrite, Membership, MembershipFilter, PermissionStore, ScopeMatch,
    WriteOutcome,
};

use super::condition::{grant_condition, membership_condition};
use super::entity::{
    component, default_template, grant, group, group_member, template, template_grant, user,
};
use super::mapper::{component_active_model, grant_active_model, template_grant_active_model};
use super::migrations::Migrator;

/// Map database errors to store errors.
fn map_db_err(e: DbErr) -> StoreError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg) | SqlErr::ForeignKeyConstraintViolation(msg)) => {
            StoreError::constraint(msg)
        }
        _ => StoreError::backend(e.to_string()),
    }
}

fn to_grants(rows: Vec<grant::Model>) -> Result<Vec<PermissionGrant>, StoreError> {
    rows.into_iter().map(PermissionGrant::try_from).collect()
}

/// The single-row filter identifying `grant`.
fn exact(grant: &PermissionGrant) -> GrantFilter {
    GrantFilter::new()
        .subject(grant.subject)
        .permission(grant.permission.clone())
        .scope(grant.entity_uuid.map_or(ScopeMatch::Global, ScopeMatch::Entity))
}

/// Relational store. All writes of one [`PermissionStore::write`] call share
/// a transaction.
#[derive(Clone)]
pub struct SeaOrmPermissionStore {
    db: DatabaseConnection,
}

impl SeaOrmPermissionStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Opens a connection pool. In-memory `SQLite` needs `max_connections = 1`
    /// so that every query sees the same database.
    ///
    /// # Errors
    /// Returns `StoreError::Backend` when the database is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let mut opts = ConnectOptions::new(url.to_owned());
        opts.max_connections(max_connections.max(1))
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(opts).await.map_err(map_db_err)?;
        debug!(url, "Connected to permission store");
        Ok(Self::new(db))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    /// Returns `StoreError::Backend` when a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        Migrator::up(&self.db, None).await.map_err(map_db_err)?;
        info!("Permission store migrations applied");
        Ok(())
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // --- seeding -------------------------------------------------------

    /// # Errors
    /// `StoreError::Constraint` if the user already exists.
    pub async fn add_user(&self, uuid: Uuid, login: &str) -> Result<(), StoreError> {
        let row = user::ActiveModel {
            uuid: Set(uuid),
            login: Set(login.to_owned()),
        };
        user::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Deletes the user along with its grants and memberships.
    ///
    /// # Errors
    /// Propagates database failures.
    pub async fn remove_user(&self, uuid: Uuid) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        grant::Entity::delete_many()
            .filter(grant_condition(
                &GrantFilter::new().subject(Subject::User(uuid)),
            ))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        group_member::Entity::delete_many()
            .filter(group_member::Column::UserUuid.eq(uuid))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        user::Entity::delete_by_id(uuid)
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)
    }

    /// # Errors
    /// `StoreError::Constraint` if the group already exists.
    pub async fn add_group(&self, uuid: Uuid, name: &str) -> Result<(), StoreError> {
        let row = group::ActiveModel {
            uuid: Set(uuid),
            name: Set(name.to_owned()),
        };
        group::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// # Errors
    /// `StoreError::Constraint` if the group or the user does not exist.
    pub async fn add_member(&self, group: Uuid, user: Uuid) -> Result<(), StoreError> {
        let row = group_member::ActiveModel {
            group_uuid: Set(group),
            user_uuid: Set(user),
        };
        group_member::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// # Errors
    /// `StoreError::Constraint` on a duplicate uuid or key.
    pub async fn add_entity(&self, entity: &Entity) -> Result<(), StoreError> {
        component::Entity::insert(component_active_model(entity))
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// # Errors
    /// Propagates database failures.
    pub async fn set_visibility(
        &self,
        entity: Uuid,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        component::Entity::update_many()
            .col_expr(
                component::Column::Private,
                sea_orm::sea_query::Expr::value(!visibility.is_public()),
            )
            .filter(component::Column::Uuid.eq(entity))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Deletes the entity. Its grants go with it.
    ///
    /// # Errors
    /// Propagates database failures.
    pub async fn remove_entity(&self, uuid: Uuid) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        grant::Entity::delete_many()
            .filter(grant::Column::EntityUuid.eq(uuid))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        component::Entity::delete_by_id(uuid)
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        txn.commit().await.map_err(map_db_err)
    }

    /// Stores a template and its grants.
    ///
    /// # Errors
    /// `StoreError::Constraint` if the template already exists.
    pub async fn add_template(&self, template: &PermissionTemplate) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let row = template::ActiveModel {
            uuid: Set(template.uuid),
            name: Set(template.name.clone()),
            key_pattern: Set(template.key_pattern.clone()),
        };
        template::Entity::insert(row)
            .exec_without_returning(&txn)
            .await
            .map_err(map_db_err)?;
        for grant in &template.grants {
            template_grant::Entity::insert(template_grant_active_model(template.uuid, grant))
                .exec_without_returning(&txn)
                .await
                .map_err(map_db_err)?;
        }
        txn.commit().await.map_err(map_db_err)
    }

    /// Replaces the default template configuration.
    ///
    /// # Errors
    /// Propagates database failures.
    pub async fn set_default_templates(&self, defaults: DefaultTemplates) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        default_template::Entity::delete_many()
            .exec(&txn)
            .await
            .map_err(map_db_err)?;
        let configured = [
            (EntityQualifier::Project, defaults.project),
            (EntityQualifier::Application, defaults.application),
            (EntityQualifier::Portfolio, defaults.portfolio),
        ];
        for (qualifier, template_uuid) in configured {
            let Some(template_uuid) = template_uuid else {
                continue;
            };
            let row = default_template::ActiveModel {
                qualifier: Set(qualifier.code().to_owned()),
                template_uuid: Set(template_uuid),
            };
            default_template::Entity::insert(row)
                .exec_without_returning(&txn)
                .await
                .map_err(map_db_err)?;
        }
        txn.commit().await.map_err(map_db_err)
    }

    async fn select_grants<C: ConnectionTrait>(
        conn: &C,
        filter: &GrantFilter,
    ) -> Result<Vec<PermissionGrant>, StoreError> {
        let rows = grant::Entity::find()
            .filter(grant_condition(filter))
            .order_by_asc(grant::Column::Uuid)
            .all(conn)
            .await
            .map_err(map_db_err)?;
        to_grants(rows)
    }

    async fn templates_with_grants(
        &self,
        rows: Vec<template::Model>,
    ) -> Result<Vec<PermissionTemplate>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let grant_rows = template_grant::Entity::find()
            .filter(template_grant::Column::TemplateUuid.is_in(rows.iter().map(|t| t.uuid)))
            .order_by_asc(template_grant::Column::Uuid)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let mut grants: HashMap<Uuid, Vec<TemplateGrant>> = HashMap::new();
        for row in grant_rows {
            let template_uuid = row.template_uuid;
            grants
                .entry(template_uuid)
                .or_default()
                .push(TemplateGrant::try_from(row)?);
        }
        Ok(rows
            .into_iter()
            .map(|t| PermissionTemplate {
                grants: grants.remove(&t.uuid).unwrap_or_default(),
                uuid: t.uuid,
                name: t.name,
                key_pattern: t.key_pattern,
            })
            .collect())
    }
}

#[async_trait]
impl PermissionStore for SeaOrmPermissionStore {
    async fn find_entities(&self, uuids: &[Uuid]) -> Result<Vec<Entity>, StoreError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = component::Entity::find()
            .filter(component::Column::Uuid.is_in(uuids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(Entity::try_from).collect()
    }

    async fn existing_users(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        user::Entity::find()
            .select_only()
            .column(user::Column::Uuid)
            .filter(user::Column::Uuid.is_in(uuids.iter().copied()))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn existing_groups(&self, uuids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        group::Entity::find()
            .select_only()
            .column(group::Column::Uuid)
            .filter(group::Column::Uuid.is_in(uuids.iter().copied()))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn group_uuids_of_user(&self, user: Uuid) -> Result<Vec<Uuid>, StoreError> {
        group_member::Entity::find()
            .select_only()
            .column(group_member::Column::GroupUuid)
            .filter(group_member::Column::UserUuid.eq(user))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn find_memberships(
        &self,
        filter: &MembershipFilter,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = group_member::Entity::find()
            .filter(membership_condition(filter))
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|m| Membership {
                group_uuid: m.group_uuid,
                user_uuid: m.user_uuid,
            })
            .collect())
    }

    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<PermissionGrant>, StoreError> {
        Self::select_grants(&self.db, filter).await
    }

    async fn write(&self, ops: Vec<GrantWrite>) -> Result<WriteOutcome, StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let mut outcome = WriteOutcome::default();
        for op in ops {
            match op {
                GrantWrite::Insert(grant) => {
                    // Unique indexes do not catch duplicates with NULL columns
                    // (anyone or global grants).
                    if !Self::select_grants(&txn, &exact(&grant)).await?.is_empty() {
                        return Err(StoreError::constraint(format!(
                            "grant already exists: {} {} on {:?}",
                            grant.subject, grant.permission, grant.entity_uuid
                        )));
                    }
                    grant::Entity::insert(grant_active_model(&grant))
                        .exec_without_returning(&txn)
                        .await
                        .map_err(map_db_err)?;
                    outcome.inserted.push(grant);
                }
                GrantWrite::Delete(filter) => {
                    let removed = Self::select_grants(&txn, &filter).await?;
                    if removed.is_empty() {
                        continue;
                    }
                    grant::Entity::delete_many()
                        .filter(grant_condition(&filter))
                        .exec(&txn)
                        .await
                        .map_err(map_db_err)?;
                    outcome.deleted.extend(removed);
                }
            }
        }
        txn.commit().await.map_err(map_db_err)?;
        Ok(outcome)
    }
}

#[async_trait]
impl TemplateReadModel for SeaOrmPermissionStore {
    async fn find_template(&self, uuid: Uuid) -> Result<Option<PermissionTemplate>, StoreError> {
        let Some(row) = template::Entity::find_by_id(uuid)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
        else {
            return Ok(None);
        };
        Ok(self.templates_with_grants(vec![row]).await?.pop())
    }

    async fn list_templates(&self) -> Result<Vec<PermissionTemplate>, StoreError> {
        let rows = template::Entity::find()
            .order_by_asc(template::Column::Name)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        self.templates_with_grants(rows).await
    }

    async fn default_templates(&self) -> Result<DefaultTemplates, StoreError> {
        let rows = default_template::Entity::find()
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        let mut defaults = DefaultTemplates::default();
        for row in rows {
            match EntityQualifier::from_code(&row.qualifier) {
                Some(EntityQualifier::Project) => defaults.project = Some(row.template_uuid),
                Some(EntityQualifier::Application) => {
                    defaults.application = Some(row.template_uuid);
                }
                Some(EntityQualifier::Portfolio) => defaults.portfolio = Some(row.template_uuid),
                None => {
                    return Err(StoreError::malformed(format!(
                        "default template for unknown qualifier '{}'",
                        row.qualifier
                    )));
                }
            }
        }
        Ok(defaults)
    }
}
