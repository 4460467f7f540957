use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jury")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub soutenance_id: Uuid,
    pub member_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::soutenance::Entity",
        from = "Column::SoutenanceId",
        to = "super::soutenance::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Soutenance,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::MemberId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Member,
}

impl Related<super::soutenance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Soutenance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
