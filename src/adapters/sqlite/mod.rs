//! SQLite adapters: connection pooling, migrations, and the Schedule Store.

pub mod connection;
pub mod migrations;
pub mod reference_registry;
pub mod schedule_store;
pub mod signal_store;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use reference_registry::SqliteReferenceRegistry;
pub use schedule_store::SqliteScheduleStore;
pub use signal_store::SqliteControlSignalStore;

use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, InitError> {
    let pool = create_pool(database_url, None).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

pub async fn initialize_default_database() -> Result<SqlitePool, InitError> {
    initialize_database("sqlite:.orbital/orbital.db").await
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, InitError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
