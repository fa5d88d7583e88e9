//! Connection-pool construction and migration runner.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Opens a connection pool against `database_url`, capping it at
/// `max_connections` concurrent connections.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Applies every pending migration under `migrations/`. Safe to call on every
/// startup; already-applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
