//! Postgres pool for the auth store
//!
//! Connects, applies migrations and confirms the users/nonces/audit tables
//! are present before the server starts taking logins.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Tables the auth flow reads and writes
pub const AUTH_TABLES: [&str; 3] = ["users", "nonces", "login_attempts"];

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Auth table missing from schema: {0}")]
    MissingTable(&'static str),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Pool settings derived from the server config.
///
/// A request never waits on the pool past its own deadline.
pub fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections.max(1))
        .min_connections(1)
        .acquire_timeout(config.request_timeout())
        .idle_timeout(Duration::from_secs(600))
}

/// Open the pool, migrate, and check the auth schema
pub async fn connect(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!("Connecting to database at {}", config.database_url_masked());

    let pool = pool_options(config)
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connection pool created"
    );

    run_migrations(&pool).await?;
    check_health(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations completed");

    Ok(())
}

/// Check connectivity and that every auth table exists
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    let present: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT t, to_regclass(t) IS NOT NULL
        FROM unnest($1::text[]) AS t
        "#,
    )
    .bind(AUTH_TABLES.to_vec())
    .fetch_all(pool)
    .await
    .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    for table in AUTH_TABLES {
        let found = present.iter().any(|(name, exists)| name == table && *exists);
        if !found {
            return Err(DbError::MissingTable(table));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert("DATABASE_URL".into(), "postgres://localhost/gallery".into());
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_pool_options_follow_config() {
        let config = config_with(&[("DB_MAX_CONNECTIONS", "12"), ("REQUEST_TIMEOUT_SECONDS", "3")]);
        let options = pool_options(&config);

        assert_eq!(options.get_max_connections(), 12);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_pool_keeps_at_least_one_connection() {
        let config = config_with(&[("DB_MAX_CONNECTIONS", "0")]);
        assert_eq!(pool_options(&config).get_max_connections(), 1);
    }

    #[test]
    fn test_missing_table_names_table() {
        assert_eq!(
            DbError::MissingTable("nonces").to_string(),
            "Auth table missing from schema: nonces"
        );
    }
}
