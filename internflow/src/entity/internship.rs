use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Lifecycle of an internship. `InProgress` and `Completed` have no
/// triggering endpoint and are driven outside the API.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum InternshipStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
    InProgress = 3,
    Completed = 4,
}

impl InternshipStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "internship")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Option<Uuid>,
    /// PFE / Stage / Internship (free text, labelled when known).
    pub kind: String,
    pub company_name: String,
    /// Path of the uploaded "cahier de charges", relative to the media root.
    pub cahier_de_charges: String,
    pub status: InternshipStatus,
    pub start_date: Date,
    pub end_date: Date,
    pub description: Option<String>,
    pub title: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Display label for the internship type.
pub fn kind_label(kind: &str) -> &str {
    match kind {
        "PFE" => "Projet de Fin d'Études",
        "Stage" => "Stage",
        "Internship" => "Internship",
        other => other,
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TeacherId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Teacher,
    #[sea_orm(has_many = "super::teacher_invitation::Entity")]
    TeacherInvitation,
    #[sea_orm(has_many = "super::soutenance::Entity")]
    Soutenance,
}

impl Related<super::teacher_invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeacherInvitation.def()
    }
}

impl Related<super::soutenance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Soutenance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
