//! Database migration runner for RagVault.
//!
//! Runs as the schema owner: `DATABASE_URL` must point at a role allowed to
//! create tables, policies and the `ragvault_app` role. The server connects
//! with a separate, non-owner role.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use ragvault_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI sets up its own tracing.
    cli::run_cli(Migrator).await;
}
