use diesel::{
    r2d2::{ConnectionManager, Pool, PooledConnection},
    PgConnection,
};

use crate::core::config::DatabaseConfig;
use crate::core::shared::error::{ApiError, ApiResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder().max_size(config.pool_size).build(manager)
}

/// Pool that connects on first checkout; startup does not wait for the database.
pub fn create_lazy_conn(config: &DatabaseConfig) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(2))
        .build_unchecked(manager)
}

pub fn get_conn(pool: &DbPool) -> Result<DbConn, ApiError> {
    pool.get().map_err(ApiError::from)
}

/// Runs blocking diesel work off the async executor with a pooled connection.
pub async fn with_conn<T, F>(pool: &DbPool, work: F) -> ApiResult<T>
where
    F: FnOnce(&mut PgConnection) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = get_conn(&pool)?;
        work(&mut conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Migration error: {}", e),
            ))
        },
    )?;
    Ok(())
}

/// Money is stored as float8; two amounts within a cent are equal.
pub fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 0.01
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_match_within_a_cent() {
        assert!(amounts_match(100.0, 100.004));
        assert!(amounts_match(0.1 + 0.2, 0.3));
        assert!(!amounts_match(100.0, 100.02));
    }
}
