// handlers/root/tenant/show.rs - GET /api/root/tenants/:subdomain

use axum::{
    extract::{Path, State},
    Extension,
};

use super::TenantView;
use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};

pub async fn tenant_show<S, D>(
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

    Ok(ApiResponse::success(TenantView::load(&state, tenant).await))
}
