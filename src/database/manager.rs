use async_trait::async_trait;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgPool, PgPoolOptions},
    Postgres,
};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::{statements, PartitionBackend, SchemaMigrator};
use crate::tenancy::SchemaContext;

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid partition name: {0}")]
    InvalidPartitionName(String),

    #[error("Partition unavailable: {0}")]
    PartitionUnavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pooled connection the partition primitives run against
pub type PgPartitionConnection = PoolConnection<Postgres>;

/// Hands out connections wrapped in a fresh partition context
#[async_trait]
pub trait ConnectionSource: Clone + Send + Sync + 'static {
    type Conn: PartitionBackend + SchemaMigrator + 'static;

    /// Check out a connection pointing at the shared partition
    async fn acquire(&self) -> Result<SchemaContext<Self::Conn>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Owns the connection pool for the single tenant-partitioned database.
///
/// Every connection is pointed at the shared partition when it is opened and again
/// whenever it is checked out, so a `SchemaContext` built on a fresh checkout always
/// starts in agreement with the server-side search path.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Build the pool without opening a connection yet
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(statements::RESET_SEARCH_PATH_SQL)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .before_acquire(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(statements::RESET_SEARCH_PATH_SQL)
                        .execute(&mut *conn)
                        .await?;
                    Ok(true)
                })
            })
            .connect_lazy(url)?;

        Ok(Self { pool })
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

#[async_trait]
impl ConnectionSource for DatabaseManager {
    type Conn = PgPartitionConnection;

    async fn acquire(&self) -> Result<SchemaContext<PgPartitionConnection>, DatabaseError> {
        let conn = self.pool.acquire().await?;
        Ok(SchemaContext::new(conn))
    }

    /// Pings the pool to ensure connectivity
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
