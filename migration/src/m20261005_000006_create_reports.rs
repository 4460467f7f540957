use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Report::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Report::Name).string().not_null())
                    .col(ColumnDef::new(Report::Description).text().not_null())
                    .col(ColumnDef::new(Report::FilePath).string().not_null())
                    .col(
                        ColumnDef::new(Report::IsArchived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Report::AddedBy).uuid().not_null())
                    .col(ColumnDef::new(Report::PublishDate).date().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_report_added_by")
                            .from(Report::Table, Report::AddedBy)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    Name,
    Description,
    FilePath,
    IsArchived,
    AddedBy,
    PublishDate,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
}
