// handlers/root/tenant/provision.rs - POST /api/root/tenants/:subdomain/provision
//
// Re-submits provisioning, e.g. after a failed run. Tenant migrations are idempotent and
// default departments are only seeded when the run creates the partition, so resubmitting
// for a complete partition leaves its data alone.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::TenantView;
use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};

pub async fn tenant_provision<S, D>(
    State(state): State<AppState<S, D>>,
    Extension(conn): Extension<RequestConnection<S::Conn>>,
    Path(subdomain): Path<String>,
) -> ApiResult<TenantView>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let tenant = {
        let mut ctx = conn.0.lock().await;
        state.tenants.find_by_subdomain(&mut *ctx, &subdomain).await?
    };

    if state.provisioner.submit(&tenant).await?.is_none() {
        tracing::debug!("Provisioning for {} already in flight", tenant.subdomain);
    }

    Ok(ApiResponse::accepted(TenantView::load(&state, tenant).await))
}
