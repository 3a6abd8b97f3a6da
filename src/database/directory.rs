use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, PgPartitionConnection};
use crate::database::models::{ActivationStamps, NewTenantRecord, TenantRecord};

/// Access to the tenant directory table.
///
/// Every method runs unqualified statements on the given connection, so callers must hold
/// the shared partition (see `SchemaContext::with_shared_partition`) while using it.
#[async_trait]
pub trait TenantDirectory<C: Send>: Send + Sync {
    async fn find_by_subdomain(
        &self,
        conn: &mut C,
        subdomain: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError>;

    async fn find_by_partition(
        &self,
        conn: &mut C,
        partition: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError>;

    /// All tenants, or only those owned by `owner`, newest first
    async fn list(&self, conn: &mut C, owner: Option<Uuid>) -> Result<Vec<TenantRecord>, DatabaseError>;

    async fn insert(&self, conn: &mut C, tenant: &NewTenantRecord) -> Result<TenantRecord, DatabaseError>;

    async fn set_active(
        &self,
        conn: &mut C,
        id: Uuid,
        active: bool,
    ) -> Result<Option<TenantRecord>, DatabaseError>;
}

const TENANT_COLUMNS: &str = "id, owner_id, subdomain, schema_name, is_active, \
     activated_at, deactivated_at, created_at, updated_at";

/// PostgreSQL-backed directory
#[derive(Debug, Clone, Copy, Default)]
pub struct PgTenantDirectory;

#[async_trait]
impl TenantDirectory<PgPartitionConnection> for PgTenantDirectory {
    async fn find_by_subdomain(
        &self,
        conn: &mut PgPartitionConnection,
        subdomain: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        let query = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE subdomain = $1");
        let tenant = sqlx::query_as::<_, TenantRecord>(&query)
            .bind(subdomain)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(tenant)
    }

    async fn find_by_partition(
        &self,
        conn: &mut PgPartitionConnection,
        partition: &str,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        let query = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE schema_name = $1");
        let tenant = sqlx::query_as::<_, TenantRecord>(&query)
            .bind(partition)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(tenant)
    }

    async fn list(
        &self,
        conn: &mut PgPartitionConnection,
        owner: Option<Uuid>,
    ) -> Result<Vec<TenantRecord>, DatabaseError> {
        let query = format!(
            "SELECT {TENANT_COLUMNS} FROM tenants \
             WHERE $1::uuid IS NULL OR owner_id = $1 \
             ORDER BY created_at DESC"
        );
        let tenants = sqlx::query_as::<_, TenantRecord>(&query)
            .bind(owner)
            .fetch_all(&mut **conn)
            .await?;
        Ok(tenants)
    }

    async fn insert(
        &self,
        conn: &mut PgPartitionConnection,
        tenant: &NewTenantRecord,
    ) -> Result<TenantRecord, DatabaseError> {
        let stamps = ActivationStamps::for_state(tenant.is_active, Utc::now());
        let query = format!(
            "INSERT INTO tenants (id, owner_id, subdomain, schema_name, is_active, activated_at, deactivated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TENANT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, TenantRecord>(&query)
            .bind(tenant.id)
            .bind(tenant.owner_id)
            .bind(&tenant.subdomain)
            .bind(tenant.partition.as_str())
            .bind(tenant.is_active)
            .bind(stamps.activated_at)
            .bind(stamps.deactivated_at)
            .fetch_one(&mut **conn)
            .await?;
        Ok(record)
    }

    async fn set_active(
        &self,
        conn: &mut PgPartitionConnection,
        id: Uuid,
        active: bool,
    ) -> Result<Option<TenantRecord>, DatabaseError> {
        // Right-hand sides see the row before the update, so one statement flips the flag
        // and both timestamps together.
        let query = format!(
            "UPDATE tenants SET \
                activated_at = CASE WHEN is_active = $2 THEN activated_at WHEN $2 THEN NOW() ELSE NULL END, \
                deactivated_at = CASE WHEN is_active = $2 THEN deactivated_at WHEN $2 THEN NULL ELSE NOW() END, \
                is_active = $2, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TENANT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, TenantRecord>(&query)
            .bind(id)
            .bind(active)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(record)
    }
}
