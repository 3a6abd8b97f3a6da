use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::TenancyConfig;
use crate::database::models::{NewTenantRecord, TenantRecord};
use crate::database::{DatabaseError, PartitionBackend, PartitionName, TenantDirectory};
use crate::tenancy::SchemaContext;

const SUBDOMAIN_MIN_LEN: usize = 3;
const SUBDOMAIN_MAX_LEN: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid subdomain: {0}")]
    InvalidSubdomain(String),
    #[error("Invalid partition name: {0}")]
    InvalidPartition(String),
    #[error("Subdomain is reserved: {0}")]
    BlockedSubdomain(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
}

/// Signup request for a new tenant
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub subdomain: String,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    /// Explicit partition name; generated from the tenant id when absent
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateTenant {
    pub fn new(subdomain: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
            owner_id: None,
            partition: None,
            is_active: true,
        }
    }
}

/// Partition name derived from a tenant id: `prefix` followed by 16 hex chars of its SHA-256
pub fn generate_partition(id: &Uuid, prefix: &str) -> Result<PartitionName, DatabaseError> {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    PartitionName::parse(&format!("{}{}", prefix, &hash[..16]))
}

/// Tenant directory operations. Every call borrows the shared partition on the caller's
/// connection and hands back whatever partition was active before.
pub struct TenantService<D> {
    directory: Arc<D>,
    config: TenancyConfig,
}

impl<D> TenantService<D> {
    pub fn new(directory: Arc<D>, config: TenancyConfig) -> Self {
        Self { directory, config }
    }

    /// Normalise and check a requested subdomain
    pub fn validate_subdomain(&self, subdomain: &str) -> Result<String, TenantError> {
        let subdomain = subdomain.trim().to_ascii_lowercase();

        if subdomain.len() < SUBDOMAIN_MIN_LEN || subdomain.len() > SUBDOMAIN_MAX_LEN {
            return Err(TenantError::InvalidSubdomain(format!(
                "Subdomain must be between {} and {} characters",
                SUBDOMAIN_MIN_LEN, SUBDOMAIN_MAX_LEN
            )));
        }

        if !subdomain.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(TenantError::InvalidSubdomain(
                "Subdomain can only contain letters, numbers and hyphens".to_string(),
            ));
        }

        if subdomain.starts_with('-') || subdomain.ends_with('-') {
            return Err(TenantError::InvalidSubdomain(
                "Subdomain cannot start or end with a hyphen".to_string(),
            ));
        }

        let reserved = subdomain == self.config.main_subdomain
            || subdomain == self.config.local_host
            || self.config.blocked_subdomains.iter().any(|blocked| *blocked == subdomain);
        if reserved {
            return Err(TenantError::BlockedSubdomain(subdomain));
        }

        Ok(subdomain)
    }

    /// Register a tenant in the directory. The partition itself is created by provisioning.
    pub async fn create_tenant<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        request: CreateTenant,
    ) -> Result<TenantRecord, TenantError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let subdomain = self.validate_subdomain(&request.subdomain)?;
        let id = Uuid::new_v4();
        let partition = match request.partition.as_deref() {
            Some(name) => PartitionName::parse(name)
                .ok()
                .filter(|partition| !partition.is_shared())
                .ok_or_else(|| TenantError::InvalidPartition(name.to_string()))?,
            None => generate_partition(&id, &self.config.partition_prefix)?,
        };

        let new_tenant = NewTenantRecord {
            id,
            owner_id: request.owner_id,
            subdomain,
            partition,
            is_active: request.is_active,
        };

        let directory = Arc::clone(&self.directory);
        let previous = ctx.current_partition().clone();
        let tenant = ctx
            .with_shared_partition(Some(previous), move |ctx| {
                Box::pin(async move {
                    let conn = ctx.connection();
                    if directory.find_by_subdomain(conn, &new_tenant.subdomain).await?.is_some() {
                        return Err(TenantError::AlreadyExists(new_tenant.subdomain.clone()));
                    }
                    if directory
                        .find_by_partition(conn, new_tenant.partition.as_str())
                        .await?
                        .is_some()
                    {
                        return Err(TenantError::AlreadyExists(new_tenant.partition.to_string()));
                    }

                    match directory.insert(conn, &new_tenant).await {
                        Ok(tenant) => Ok(tenant),
                        // Lost a race with a concurrent signup for the same subdomain
                        Err(DatabaseError::Sqlx(sqlx::Error::Database(db_err)))
                            if db_err.is_unique_violation() =>
                        {
                            Err(TenantError::AlreadyExists(new_tenant.subdomain.clone()))
                        }
                        Err(err) => Err(err.into()),
                    }
                })
            })
            .await?;

        info!("Registered tenant {} with partition {}", tenant.subdomain, tenant.schema_name);
        Ok(tenant)
    }

    /// Flip the active flag of the tenant owning `subdomain`
    pub async fn set_active<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        subdomain: &str,
        active: bool,
    ) -> Result<TenantRecord, TenantError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let subdomain = subdomain.to_ascii_lowercase();
        let previous = ctx.current_partition().clone();

        let tenant = ctx
            .with_shared_partition(Some(previous), move |ctx| {
                Box::pin(async move {
                    let conn = ctx.connection();
                    let tenant = directory
                        .find_by_subdomain(conn, &subdomain)
                        .await?
                        .ok_or_else(|| TenantError::NotFound(subdomain.clone()))?;

                    directory
                        .set_active(conn, tenant.id, active)
                        .await?
                        .ok_or(TenantError::NotFound(subdomain))
                })
            })
            .await?;

        info!(
            "Tenant {} is now {}",
            tenant.subdomain,
            if tenant.is_active { "active" } else { "inactive" }
        );
        Ok(tenant)
    }

    /// All tenants, or the ones owned by `owner`
    pub async fn list<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        owner: Option<Uuid>,
    ) -> Result<Vec<TenantRecord>, TenantError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let previous = ctx.current_partition().clone();

        ctx.with_shared_partition(Some(previous), move |ctx| {
            Box::pin(async move {
                directory
                    .list(ctx.connection(), owner)
                    .await
                    .map_err(TenantError::from)
            })
        })
        .await
    }

    pub async fn find_by_subdomain<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        subdomain: &str,
    ) -> Result<TenantRecord, TenantError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let subdomain = subdomain.to_ascii_lowercase();
        let previous = ctx.current_partition().clone();

        ctx.with_shared_partition(Some(previous), move |ctx| {
            Box::pin(async move {
                directory
                    .find_by_subdomain(ctx.connection(), &subdomain)
                    .await?
                    .ok_or(TenantError::NotFound(subdomain))
            })
        })
        .await
    }

    pub async fn find_by_partition<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        partition: &PartitionName,
    ) -> Result<TenantRecord, TenantError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let directory = Arc::clone(&self.directory);
        let partition = partition.to_string();
        let previous = ctx.current_partition().clone();

        ctx.with_shared_partition(Some(previous), move |ctx| {
            Box::pin(async move {
                directory
                    .find_by_partition(ctx.connection(), &partition)
                    .await?
                    .ok_or(TenantError::NotFound(partition))
            })
        })
        .await
    }
}
