// handlers/tenant.rs - GET /api/tenant
//
// Reports the tenant bound to the request and the partition its connection points at.

use axum::Extension;
use serde::Serialize;

use crate::database::PartitionBackend;
use crate::middleware::{ApiResponse, ApiResult, RequestConnection, TenantContext};

#[derive(Debug, Serialize)]
pub struct CurrentTenant {
    #[serde(flatten)]
    pub tenant: TenantContext,
    /// Partition active on the request's connection when the handler ran
    pub connection_partition: String,
}

pub async fn tenant_current<C: PartitionBackend + 'static>(
    Extension(tenant): Extension<TenantContext>,
    Extension(conn): Extension<RequestConnection<C>>,
) -> ApiResult<CurrentTenant> {
    let ctx = conn.0.lock().await;
    let connection_partition = ctx.current_partition().to_string();

    Ok(ApiResponse::success(CurrentTenant {
        tenant,
        connection_partition,
    }))
}
