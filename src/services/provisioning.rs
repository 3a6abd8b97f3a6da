// Tenant partition provisioning: create the partition, apply the tenant migrations and seed
// reference data into partitions created by the run. Runs as a background task per tenant
// with its progress kept in memory.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::migrations::{SEED_DEFAULT_DEPARTMENTS, SHARED_MIGRATIONS, TENANT_MIGRATIONS};
use crate::database::models::TenantRecord;
use crate::database::{ConnectionSource, DatabaseError, PartitionBackend, PartitionName, SchemaMigrator};
use crate::tenancy::{SchemaContext, ScopeOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Pending,
    Running,
    Completed { migrations_applied: usize, seeded: bool },
    Failed { error: String },
}

impl ProvisioningStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ProvisioningStatus::Pending | ProvisioningStatus::Running)
    }
}

/// Provisioning state per tenant id
#[derive(Debug, Clone, Default)]
pub struct ProvisioningTracker {
    statuses: Arc<RwLock<HashMap<Uuid, ProvisioningStatus>>>,
}

impl ProvisioningTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<ProvisioningStatus> {
        self.statuses.read().await.get(&id).cloned()
    }

    pub async fn set(&self, id: Uuid, status: ProvisioningStatus) {
        self.statuses.write().await.insert(id, status);
    }

    /// Mark `id` pending unless a run is already pending or running
    pub async fn try_begin(&self, id: Uuid) -> bool {
        let mut statuses = self.statuses.write().await;
        match statuses.get(&id) {
            Some(status) if status.is_in_flight() => false,
            _ => {
                statuses.insert(id, ProvisioningStatus::Pending);
                true
            }
        }
    }
}

/// Apply the shared-partition migrations, leaving the shared partition active
pub async fn migrate_shared<B>(ctx: &mut SchemaContext<B>) -> Result<usize, DatabaseError>
where
    B: PartitionBackend + SchemaMigrator,
{
    ctx.with_shared_partition(None, |ctx| {
        Box::pin(async move { ctx.connection().run_migrations(SHARED_MIGRATIONS).await })
    })
    .await
}

/// Result of a successful `provision_partition`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub migrations_applied: usize,
    /// Default departments were seeded; only when this run created the partition
    pub seeded: bool,
}

/// Apply the tenant migrations to an existing partition. Reference data is left alone.
/// The shared partition is active afterwards.
pub async fn migrate_partition<B>(
    ctx: &mut SchemaContext<B>,
    partition: &PartitionName,
) -> Result<usize, DatabaseError>
where
    B: PartitionBackend + SchemaMigrator,
{
    let target = partition.clone();
    let options = ScopeOptions::default().create_if_missing(false);
    ctx.with_partition(partition, options, move |ctx| {
        Box::pin(async move {
            ensure_active(ctx, &target)?;
            ctx.connection().run_migrations(TENANT_MIGRATIONS).await
        })
    })
    .await
}

/// Create `partition` if needed and apply the tenant migrations. Default departments are
/// seeded only into a partition this call created. The shared partition is active afterwards.
pub async fn provision_partition<B>(
    ctx: &mut SchemaContext<B>,
    partition: &PartitionName,
) -> Result<Provisioned, DatabaseError>
where
    B: PartitionBackend + SchemaMigrator,
{
    let fresh = !ctx.partition_exists(partition).await?;
    let target = partition.clone();

    ctx.with_partition(partition, ScopeOptions::default(), move |ctx| {
        Box::pin(async move {
            ensure_active(ctx, &target)?;
            let migrations_applied = ctx.connection().run_migrations(TENANT_MIGRATIONS).await?;
            if fresh {
                ctx.connection()
                    .run_migrations(std::slice::from_ref(&SEED_DEFAULT_DEPARTMENTS))
                    .await?;
            }
            Ok(Provisioned {
                migrations_applied,
                seeded: fresh,
            })
        })
    })
    .await
}

/// Seed default departments into an existing partition
pub async fn seed_default_departments<B>(
    ctx: &mut SchemaContext<B>,
    partition: &PartitionName,
) -> Result<(), DatabaseError>
where
    B: PartitionBackend + SchemaMigrator,
{
    let target = partition.clone();
    let options = ScopeOptions::default().create_if_missing(false);
    ctx.with_partition(partition, options, move |ctx| {
        Box::pin(async move {
            ensure_active(ctx, &target)?;
            ctx.connection()
                .run_migrations(std::slice::from_ref(&SEED_DEFAULT_DEPARTMENTS))
                .await?;
            Ok(())
        })
    })
    .await
}

// Activation falls back to the shared partition when the target is missing; tenant DDL
// must never land there.
fn ensure_active<B: PartitionBackend>(
    ctx: &SchemaContext<B>,
    partition: &PartitionName,
) -> Result<(), DatabaseError> {
    if ctx.current_partition() != partition {
        return Err(DatabaseError::PartitionUnavailable(partition.to_string()));
    }
    Ok(())
}

/// Provision `partition` on `ctx`, recording progress for tenant `id`
pub async fn run_provisioning<B>(
    tracker: &ProvisioningTracker,
    id: Uuid,
    ctx: &mut SchemaContext<B>,
    partition: &PartitionName,
) -> ProvisioningStatus
where
    B: PartitionBackend + SchemaMigrator,
{
    tracker.set(id, ProvisioningStatus::Running).await;

    let status = match provision_partition(ctx, partition).await {
        Ok(Provisioned { migrations_applied, seeded }) => {
            info!(
                "Provisioned partition {} ({} migrations, seeded: {})",
                partition, migrations_applied, seeded
            );
            ProvisioningStatus::Completed { migrations_applied, seeded }
        }
        Err(err) => {
            error!("Provisioning partition {} failed: {}", partition, err);
            ProvisioningStatus::Failed { error: err.to_string() }
        }
    };

    tracker.set(id, status.clone()).await;
    status
}

/// Submits provisioning runs onto the tokio runtime
#[derive(Clone)]
pub struct Provisioner<S> {
    db: S,
    tracker: ProvisioningTracker,
}

impl<S: ConnectionSource> Provisioner<S> {
    pub fn new(db: S) -> Self {
        Self {
            db,
            tracker: ProvisioningTracker::new(),
        }
    }

    pub async fn status(&self, id: Uuid) -> Option<ProvisioningStatus> {
        self.tracker.get(id).await
    }

    /// Start provisioning `tenant` on its own connection. Returns `None` when a run for this
    /// tenant is already pending or running.
    pub async fn submit(&self, tenant: &TenantRecord) -> Result<Option<JoinHandle<ProvisioningStatus>>, DatabaseError> {
        let partition = tenant.partition()?;
        if !self.tracker.try_begin(tenant.id).await {
            info!("Provisioning for tenant {} already in progress", tenant.subdomain);
            return Ok(None);
        }

        let db = self.db.clone();
        let tracker = self.tracker.clone();
        let id = tenant.id;

        Ok(Some(tokio::spawn(async move {
            match db.acquire().await {
                Ok(mut ctx) => run_provisioning(&tracker, id, &mut ctx, &partition).await,
                Err(err) => {
                    error!("No connection for provisioning {}: {}", partition, err);
                    let status = ProvisioningStatus::Failed { error: err.to_string() };
                    tracker.set(id, status.clone()).await;
                    status
                }
            }
        })))
    }
}
