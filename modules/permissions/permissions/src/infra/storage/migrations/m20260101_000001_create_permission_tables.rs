use sea_orm_migration::prelude as mig;

pub struct Migration;

impl mig::MigrationName for Migration {
    fn name(&self) -> &'static str {
        "m20260101_000001_create_permission_tables"
    }
}

fn id(name: &'static str) -> mig::Alias {
    mig::Alias::new(name)
}

fn uuid_pk(name: &'static str) -> mig::ColumnDef {
    mig::ColumnDef::new(id(name))
        .uuid()
        .not_null()
        .primary_key()
        .to_owned()
}

fn uuid_col(name: &'static str) -> mig::ColumnDef {
    mig::ColumnDef::new(id(name)).uuid().not_null().to_owned()
}

fn text_col(name: &'static str) -> mig::ColumnDef {
    mig::ColumnDef::new(id(name)).string().not_null().to_owned()
}

#[async_trait::async_trait]
impl mig::MigrationTrait for Migration {
    async fn up(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .create_table(
                mig::Table::create()
                    .table(id("users"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(text_col("login"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("groups"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(text_col("name"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("group_members"))
                    .if_not_exists()
                    .col(uuid_col("group_uuid"))
                    .col(uuid_col("user_uuid"))
                    .primary_key(
                        mig::Index::create()
                            .col(id("group_uuid"))
                            .col(id("user_uuid")),
                    )
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_group_members_group")
                            .from(id("group_members"), id("group_uuid"))
                            .to(id("groups"), id("uuid"))
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_group_members_user")
                            .from(id("group_members"), id("user_uuid"))
                            .to(id("users"), id("uuid"))
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("entities"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(text_col("entity_key").unique_key().to_owned())
                    .col(text_col("qualifier"))
                    .col(mig::ColumnDef::new(id("private")).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("grants"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(text_col("subject_kind"))
                    .col(mig::ColumnDef::new(id("subject_uuid")).uuid().null())
                    .col(text_col("permission"))
                    .col(mig::ColumnDef::new(id("entity_uuid")).uuid().null())
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_grants_entity")
                            .from(id("grants"), id("entity_uuid"))
                            .to(id("entities"), id("uuid"))
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                mig::Index::create()
                    .name("uq_grants_subject_permission_entity")
                    .table(id("grants"))
                    .col(id("subject_kind"))
                    .col(id("subject_uuid"))
                    .col(id("permission"))
                    .col(id("entity_uuid"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                mig::Index::create()
                    .name("idx_grants_entity_permission")
                    .table(id("grants"))
                    .col(id("entity_uuid"))
                    .col(id("permission"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                mig::Index::create()
                    .name("idx_group_members_user")
                    .table(id("group_members"))
                    .col(id("user_uuid"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("permission_templates"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(text_col("name"))
                    .col(mig::ColumnDef::new(id("key_pattern")).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("permission_template_grants"))
                    .if_not_exists()
                    .col(uuid_pk("uuid"))
                    .col(uuid_col("template_uuid"))
                    .col(text_col("subject_kind"))
                    .col(mig::ColumnDef::new(id("subject_uuid")).uuid().null())
                    .col(text_col("permission"))
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_template_grants_template")
                            .from(id("permission_template_grants"), id("template_uuid"))
                            .to(id("permission_templates"), id("uuid"))
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(id("default_templates"))
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(id("qualifier"))
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(uuid_col("template_uuid"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        for table in [
            "default_templates",
            "permission_template_grants",
            "permission_templates",
            "grants",
            "entities",
            "group_members",
            "groups",
            "users",
        ] {
            manager
                .drop_table(mig::Table::drop().table(id(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
