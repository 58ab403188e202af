//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and applied in lexical
//! order of their names, each at most once.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_tenancy;
mod m20260301_000002_row_level_security;
mod m20260301_000003_refresh_tokens;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_tenancy::Migration),
            Box::new(m20260301_000002_row_level_security::Migration),
            Box::new(m20260301_000003_refresh_tokens::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_in_lexical_order() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        sorted.dedup();
        assert_eq!(names.len(), sorted.len());
    }
}
