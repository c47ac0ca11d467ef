use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// One ACL row. `subject_uuid` is null for `anyone`, `entity_uuid` is null
/// for global grants.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "grants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub subject_kind: String,
    pub subject_uuid: Option<Uuid>,
    pub permission: String,
    pub entity_uuid: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::component::Entity",
        from = "Column::EntityUuid",
        to = "super::component::Column::Uuid",
        on_delete = "Cascade"
    )]
    Component,
}

impl Related<super::component::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Component.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
