use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::manager::{DatabaseError, PgPartitionConnection};
use crate::database::statements;

/// Validated name of a PostgreSQL schema holding one partition of data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionName(String);

impl PartitionName {
    /// The shared partition holding the tenant directory
    pub const SHARED: &'static str = "public";

    const MAX_LEN: usize = 63;

    /// PostgreSQL reserves `pg_*` schema names for the system catalogs
    const RESERVED_PREFIX: &'static str = "pg_";
    const RESERVED: &'static [&'static str] = &["information_schema"];

    pub fn shared() -> Self {
        Self(Self::SHARED.to_string())
    }

    /// Accepts lowercase ASCII letters, digits, `_` and `-`, starting with a letter or `_`,
    /// at most 63 bytes (the PostgreSQL identifier limit). System schemas are rejected.
    pub fn parse(name: &str) -> Result<Self, DatabaseError> {
        let valid = !name.is_empty()
            && !name.starts_with(Self::RESERVED_PREFIX)
            && !Self::RESERVED.contains(&name)
            && name.len() <= Self::MAX_LEN
            && name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(DatabaseError::InvalidPartitionName(name.to_string()))
        }
    }

    pub fn is_shared(&self) -> bool {
        self.0 == Self::SHARED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three statements the partition layer needs from a database connection.
///
/// Implementations must not cache `partition_exists`: a partition created by another
/// connection has to be visible on the next check.
#[async_trait]
pub trait PartitionBackend: Send {
    async fn partition_exists(&mut self, partition: &PartitionName) -> Result<bool, DatabaseError>;

    /// Create the partition, succeeding if it already exists (including when a concurrent
    /// caller created it first)
    async fn create_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError>;

    /// Point subsequent statements on this connection at the partition
    async fn set_active_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError>;
}

#[async_trait]
impl PartitionBackend for PgPartitionConnection {
    async fn partition_exists(&mut self, partition: &PartitionName) -> Result<bool, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as(statements::PARTITION_EXISTS_SQL)
            .bind(partition.as_str())
            .fetch_optional(&mut **self)
            .await?;
        Ok(row.is_some())
    }

    async fn create_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError> {
        let sql = statements::create_partition_sql(partition);
        sqlx::query(&sql).execute(&mut **self).await?;
        Ok(())
    }

    async fn set_active_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError> {
        let sql = statements::activate_partition_sql(partition);
        sqlx::query(&sql).execute(&mut **self).await?;
        Ok(())
    }
}
