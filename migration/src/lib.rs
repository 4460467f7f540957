pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_roles;
mod m20261001_000002_create_app_users;
mod m20261002_000003_create_internships;
mod m20261002_000004_create_teacher_invitations;
mod m20261003_000005_create_soutenances;
mod m20261005_000006_create_reports;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_roles::Migration),
            Box::new(m20261001_000002_create_app_users::Migration),
            Box::new(m20261002_000003_create_internships::Migration),
            Box::new(m20261002_000004_create_teacher_invitations::Migration),
            Box::new(m20261003_000005_create_soutenances::Migration),
            Box::new(m20261005_000006_create_reports::Migration),
        ]
    }
}
