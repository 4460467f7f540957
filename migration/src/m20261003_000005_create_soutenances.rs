use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // soutenance
        manager
            .create_table(
                Table::create()
                    .table(Soutenance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Soutenance::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Soutenance::InternshipId).uuid().not_null())
                    .col(ColumnDef::new(Soutenance::Date).date().not_null())
                    .col(ColumnDef::new(Soutenance::Time).time().not_null())
                    .col(ColumnDef::new(Soutenance::Room).string().not_null())
                    .col(ColumnDef::new(Soutenance::Grade).double().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_soutenance_internship")
                            .from(Soutenance::Table, Soutenance::InternshipId)
                            .to(Internship::Table, Internship::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // jury
        manager
            .create_table(
                Table::create()
                    .table(Jury::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jury::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jury::SoutenanceId).uuid().not_null())
                    .col(ColumnDef::new(Jury::MemberId).uuid().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_jury_soutenance")
                            .from(Jury::Table, Jury::SoutenanceId)
                            .to(Soutenance::Table, Soutenance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_jury_member")
                            .from(Jury::Table, Jury::MemberId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Jury::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Soutenance::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Soutenance {
    Table,
    Id,
    InternshipId,
    Date,
    Time,
    Room,
    Grade,
}

#[derive(Iden)]
enum Jury {
    Table,
    Id,
    SoutenanceId,
    MemberId,
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
