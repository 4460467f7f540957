use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// The roles every installation starts with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoleName {
    Student,
    Teacher,
    Administrator,
    Company,
}

impl RoleName {
    pub const ALL: [RoleName; 4] = [
        RoleName::Student,
        RoleName::Teacher,
        RoleName::Administrator,
        RoleName::Company,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::Student => "Student",
            RoleName::Teacher => "Teacher",
            RoleName::Administrator => "Administrator",
            RoleName::Company => "Company",
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
