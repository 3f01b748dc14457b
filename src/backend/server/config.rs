/**
 * Server Configuration
 *
 * Connects the optional backing services named in [`AppConfig`].
 *
 * # Error Handling
 *
 * Failures are logged but do not prevent server startup. A service that
 * is not configured or cannot be reached comes back as `None`, and the
 * caller falls back to the in-memory adapter.
 */

use sqlx::PgPool;

use crate::backend::coordination::RedisCoordination;
use crate::shared::config::AppConfig;

/// Connect to PostgreSQL and run the migrations in `migrations/`
///
/// # Returns
///
/// - `Some(PgPool)` if the database is configured and reachable
/// - `None` if `database_url` is not set or the connection fails
pub async fn load_database(config: &AppConfig) -> Option<PgPool> {
    let database_url = match config.database_url.as_deref() {
        Some(url) => url,
        None => {
            tracing::warn!("DATABASE_URL not set. Using the in-memory store.");
            return None;
        }
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Using the in-memory store.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}

/// Connect to Redis for shared presence state and cross-instance fan-out
pub async fn load_coordination(config: &AppConfig) -> Option<RedisCoordination> {
    let redis_url = match config.redis_url.as_deref() {
        Some(url) => url,
        None => {
            tracing::warn!("REDIS_URL not set. Running in single-instance mode.");
            return None;
        }
    };

    tracing::info!("Connecting to Redis...");
    match RedisCoordination::connect(redis_url).await {
        Ok(coordination) => {
            tracing::info!("Redis connection established");
            Some(coordination)
        }
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {}", e);
            tracing::warn!("Running in single-instance mode.");
            None
        }
    }
}
