use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Internship::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Internship::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Internship::StudentId).uuid().not_null())
                    .col(ColumnDef::new(Internship::TeacherId).uuid().null())
                    .col(ColumnDef::new(Internship::Kind).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Internship::CompanyName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Internship::CahierDeCharges)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Internship::Status)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Internship::StartDate).date().not_null())
                    .col(ColumnDef::new(Internship::EndDate).date().not_null())
                    .col(ColumnDef::new(Internship::Description).text().null())
                    .col(
                        ColumnDef::new(Internship::Title)
                            .string()
                            .not_null()
                            .default("Untitled"),
                    )
                    .col(
                        ColumnDef::new(Internship::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Internship::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_internship_student")
                            .from(Internship::Table, Internship::StudentId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_internship_teacher")
                            .from(Internship::Table, Internship::TeacherId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_internship_status")
                    .table(Internship::Table)
                    .col(Internship::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Internship::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Internship {
    Table,
    Id,
    StudentId,
    TeacherId,
    Kind,
    CompanyName,
    CahierDeCharges,
    Status,
    StartDate,
    EndDate,
    Description,
    Title,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
}
