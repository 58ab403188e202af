//! Connection pool setup.
//!
//! The pool is built with `sqlx` directly so that every connection returned
//! to the pool has the tenant setting reset before the next checkout.

use std::time::Duration;

use ragvault_shared::config::DatabaseConfig;
use sea_orm::{DatabaseConnection, DbErr, RuntimeErr, SqlxPostgresConnector};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::rls::RESET_TENANT_SQL;

/// Builds the pool options used by [`connect`].
#[must_use]
pub fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .after_release(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(RESET_TENANT_SQL)
                    .execute(&mut *conn)
                    .await?;
                Ok(true)
            })
        })
}

/// Establishes the application connection pool.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let pool = pool_options(config)
        .connect(&config.url)
        .await
        .map_err(|e| DbErr::Conn(RuntimeErr::SqlxError(e)))?;
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "database pool ready"
    );
    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}
