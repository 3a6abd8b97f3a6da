// In-memory stand-ins for a PostgreSQL connection and the tenant directory.
//
// `MockBackend` tracks the server-side search path the way PostgreSQL does: the `tenants`
// table only exists in the shared partition, so a directory lookup issued while a tenant
// partition is active fails like an unqualified query against a missing relation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

use crate::database::models::{ActivationStamps, NewTenantRecord, TenantRecord};
use crate::database::{
    ConnectionSource, DatabaseError, Migration, PartitionBackend, PartitionName, SchemaMigrator, TenantDirectory,
};
use crate::tenancy::SchemaContext;

/// Error as surfaced by the driver for a failed statement
pub fn server_error(message: impl Into<String>) -> DatabaseError {
    DatabaseError::Sqlx(sqlx::Error::Protocol(message.into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Exists(String),
    Create(String),
    Activate(String),
    Migrate { partition: String, migration: &'static str },
    Lookup { partition: String, subdomain: String },
    Write { partition: String, subdomain: String },
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub partitions: HashSet<String>,
    pub search_path: String,
    pub log: Vec<Statement>,
    pub tenants: Vec<TenantRecord>,
    pub fail_activation_of: Option<String>,
    pub fail_creation: bool,
    pub fail_lookups: bool,
}

impl MockBackend {
    pub fn with_partitions(partitions: &[&str]) -> Self {
        Self {
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            search_path: PartitionName::SHARED.to_string(),
            log: Vec::new(),
            tenants: Vec::new(),
            fail_activation_of: None,
            fail_creation: false,
            fail_lookups: false,
        }
    }

    /// Partitions named by successful activation statements, in order
    pub fn activations(&self) -> Vec<String> {
        self.log
            .iter()
            .filter_map(|statement| match statement {
                Statement::Activate(partition) => Some(partition.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn migrations_in(&self, partition: &str) -> Vec<&'static str> {
        self.log
            .iter()
            .filter_map(|statement| match statement {
                Statement::Migrate { partition: p, migration } if p == partition => Some(*migration),
                _ => None,
            })
            .collect()
    }

    fn require_directory(&self) -> Result<(), DatabaseError> {
        if self.fail_lookups {
            return Err(server_error("connection reset".to_string()));
        }
        if self.search_path != PartitionName::SHARED {
            return Err(server_error(
                "relation \"tenants\" does not exist".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionBackend for MockBackend {
    async fn partition_exists(&mut self, partition: &PartitionName) -> Result<bool, DatabaseError> {
        self.log.push(Statement::Exists(partition.to_string()));
        Ok(partition.is_shared() || self.partitions.contains(partition.as_str()))
    }

    async fn create_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError> {
        if self.fail_creation {
            return Err(server_error("permission denied for database".to_string()));
        }
        self.log.push(Statement::Create(partition.to_string()));
        self.partitions.insert(partition.to_string());
        Ok(())
    }

    async fn set_active_partition(&mut self, partition: &PartitionName) -> Result<(), DatabaseError> {
        if self.fail_activation_of.as_deref() == Some(partition.as_str()) {
            return Err(server_error("server closed the connection".to_string()));
        }
        self.log.push(Statement::Activate(partition.to_string()));
        self.search_path = partition.to_string();
        Ok(())
    }
}

#[async_trait]
impl SchemaMigrator for MockBackend {
    async fn run_migrations(&mut self, migrations: &[Migration]) -> Result<usize, DatabaseError> {
        for migration in migrations {
            self.log.push(Statement::Migrate {
                partition: self.search_path.clone(),
                migration: migration.name,
            });
        }
        Ok(migrations.len())
    }
}

/// Pool stand-in: every checkout is a copy of `template` pointing at the shared partition
#[derive(Debug, Clone)]
pub struct MockSource {
    pub template: MockBackend,
    pub unavailable: bool,
}

impl MockSource {
    pub fn new(template: MockBackend) -> Self {
        Self {
            template,
            unavailable: false,
        }
    }

    /// A source whose checkouts time out
    pub fn unavailable() -> Self {
        Self {
            template: MockBackend::with_partitions(&[]),
            unavailable: true,
        }
    }
}

#[async_trait]
impl ConnectionSource for MockSource {
    type Conn = MockBackend;

    async fn acquire(&self) -> Result<SchemaContext<MockBackend>, DatabaseError> {
        if self.unavailable {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut conn = self.template.clone();
        conn.search_path = PartitionName::SHARED.to_string();
        conn.log.clear();
        Ok(SchemaContext::new(conn))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.unavailable {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

/// Directory reading the tenant rows stored on `MockBackend`
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDirectory;

#[async_trait]
impl TenantDirectory<MockBackend> for MockDirectory {
    async fn find_by_subdomain(
        &self,
        conn: &mut MockBackend,
        subdomain: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        conn.require_directory()?;
        conn.log.push(Statement::Lookup {
            partition: conn.search_path.clone(),
            subdomain: subdomain.to_string(),
        });
        Ok(conn.tenants.iter().find(|t| t.subdomain == subdomain).cloned())
    }

    async fn find_by_partition(
        &self,
        conn: &mut MockBackend,
        partition: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        conn.require_directory()?;
        Ok(conn.tenants.iter().find(|t| t.schema_name == partition).cloned())
    }

    async fn list(&self, conn: &mut MockBackend, owner: Option<Uuid>) -> Result<Vec<TenantRecord>, DatabaseError> {
        conn.require_directory()?;
        Ok(conn
            .tenants
            .iter()
            .filter(|t| owner.is_none() || t.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn insert(&self, conn: &mut MockBackend, tenant: &NewTenantRecord) -> Result<TenantRecord, DatabaseError> {
        conn.require_directory()?;
        if conn.tenants.iter().any(|t| t.subdomain == tenant.subdomain) {
            return Err(server_error(
                "duplicate key value violates unique constraint \"tenants_subdomain_key\"".to_string(),
            ));
        }
        conn.log.push(Statement::Write {
            partition: conn.search_path.clone(),
            subdomain: tenant.subdomain.clone(),
        });
        let now = Utc::now();
        let stamps = ActivationStamps::for_state(tenant.is_active, now);
        let record = TenantRecord {
            id: tenant.id,
            owner_id: tenant.owner_id,
            subdomain: tenant.subdomain.clone(),
            schema_name: tenant.partition.to_string(),
            is_active: tenant.is_active,
            activated_at: stamps.activated_at,
            deactivated_at: stamps.deactivated_at,
            created_at: now,
            updated_at: now,
        };
        conn.tenants.push(record.clone());
        Ok(record)
    }

    async fn set_active(
        &self,
        conn: &mut MockBackend,
        id: Uuid,
        active: bool,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        conn.require_directory()?;
        let now = Utc::now();
        Ok(conn.tenants.iter_mut().find(|t| t.id == id).map(|tenant| {
            tenant.apply_active(active, now);
            tenant.clone()
        }))
    }
}

pub fn tenant_record(subdomain: &str, partition: &str) -> TenantRecord {
    let now = Utc::now();
    TenantRecord {
        id: Uuid::new_v4(),
        owner_id: None,
        subdomain: subdomain.to_string(),
        schema_name: partition.to_string(),
        is_active: true,
        activated_at: Some(now),
        deactivated_at: None,
        created_at: now,
        updated_at: now,
    }
}
