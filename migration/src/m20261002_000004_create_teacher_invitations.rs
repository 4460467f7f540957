use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TeacherInvitation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TeacherInvitation::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::InternshipId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::StudentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::TeacherId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::Status)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::Message)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TeacherInvitation::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitation_internship")
                            .from(TeacherInvitation::Table, TeacherInvitation::InternshipId)
                            .to(Internship::Table, Internship::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitation_student")
                            .from(TeacherInvitation::Table, TeacherInvitation::StudentId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitation_teacher")
                            .from(TeacherInvitation::Table, TeacherInvitation::TeacherId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invitation_internship_teacher")
                    .table(TeacherInvitation::Table)
                    .col(TeacherInvitation::InternshipId)
                    .col(TeacherInvitation::TeacherId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TeacherInvitation::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TeacherInvitation {
    Table,
    Id,
    InternshipId,
    StudentId,
    TeacherId,
    Status,
    Message,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Internship {
    Table,
    Id,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
}
