use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Oral defense of an internship.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "soutenance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub internship_id: Uuid,
    pub date: Date,
    pub time: Time,
    pub room: String,
    pub grade: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::internship::Entity",
        from = "Column::InternshipId",
        to = "super::internship::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Internship,
    #[sea_orm(has_many = "super::jury::Entity")]
    Jury,
}

impl Related<super::internship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Internship.def()
    }
}

impl Related<super::jury::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jury.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
