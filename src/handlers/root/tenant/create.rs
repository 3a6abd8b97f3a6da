// handlers/root/tenant/create.rs - POST /api/root/tenants
//
// Registers the tenant in the directory, then submits provisioning of its partition.
// The response is sent as soon as the row exists; poll show or health for progress.
//
// Input:
// ```json
// { "subdomain": "acme", "owner_id": "uuid?", "partition": "string?", "is_active": true }
// ```

use axum::{extract::State, Extension, Json};

use super::TenantView;
use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};
use crate::services::CreateTenant;

pub async fn tenant_create<S, D>(
    State(state): State<AppState<S, D>>,
    Extension(conn): Extension<RequestConnection<S::Conn>>,
    Json(request): Json<CreateTenant>,
) -> ApiResult<TenantView>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let tenant = {
        let mut ctx = conn.0.lock().await;
        state.tenants.create_tenant(&mut *ctx, request).await?
    };

    // Provisioning runs on its own connection
    state.provisioner.submit(&tenant).await?;

    Ok(ApiResponse::created(TenantView::load(&state, tenant).await))
}
