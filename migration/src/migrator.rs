use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608270001_create_session_tokens::Migration),
            Box::new(migrations::m202608270002_create_attendance_records::Migration),
            Box::new(migrations::m202608270003_create_class_enrollments::Migration),
        ]
    }
}
