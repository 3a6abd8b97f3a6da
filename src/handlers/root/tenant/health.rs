// handlers/root/tenant/health.rs - GET /api/root/tenants/:subdomain/health
//
// Whether the tenant's partition exists, plus the last provisioning outcome.

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Serialize;

use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};
use crate::services::ProvisioningStatus;

#[derive(Debug, Serialize)]
pub struct TenantHealth {
    pub subdomain: String,
    pub partition: String,
    pub is_active: bool,
    pub partition_exists: bool,
    pub provisioning: Option<ProvisioningStatus>,
}

pub async fn tenant_health<S, D>(
    State(state): State<AppState<S, D>>,
    Extension(conn): Extension<RequestConnection<S::Conn>>,
    Path(subdomain): Path<String>,
) -> ApiResult<TenantHealth>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let (tenant, partition_exists) = {
        let mut ctx = conn.0.lock().await;
        let tenant = state.tenants.find_by_subdomain(&mut *ctx, &subdomain).await?;
        let partition = tenant.partition()?;
        let exists = ctx.partition_exists(&partition).await?;
        (tenant, exists)
    };

    Ok(ApiResponse::success(TenantHealth {
        provisioning: state.provisioner.status(tenant.id).await,
        subdomain: tenant.subdomain,
        partition: tenant.schema_name,
        is_active: tenant.is_active,
        partition_exists,
    }))
}
