//! Postgres pool for the quota store.
//!
//! Connects with the configured pool size and applies the `usage_records`
//! migrations before `PgQuotaStore` serves any request.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect to `database_url` and bring the schema up to date.
///
/// # Errors
///
/// Returns the connection or migration error.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    tracing::debug!(max_connections, "database pool connected");

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    Ok(pool)
}
