use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Default template per entity qualifier.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "default_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub qualifier: String,
    pub template_uuid: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
