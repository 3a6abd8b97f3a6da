// handlers/root/tenant/update.rs - PATCH /api/root/tenants/:subdomain
//
// Input: `{ "is_active": bool }`. Only the activation flag is mutable; the partition and
// subdomain are fixed at creation.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use super::TenantView;
use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};

#[derive(Debug, Deserialize)]
pub struct UpdateTenant {
    pub is_active: bool,
}

pub async fn tenant_update<S, D>(
    State(state): State<AppState<S, D>>,
    Extension(conn): Extension<RequestConnection<S::Conn>>,
    Path(subdomain): Path<String>,
    Json(update): Json<UpdateTenant>,
) -> ApiResult<TenantView>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let tenant = {
        let mut ctx = conn.0.lock().await;
        state
            .tenants
            .set_active(&mut *ctx, &subdomain, update.is_active)
            .await?
    };

    Ok(ApiResponse::success(TenantView::load(&state, tenant).await))
}
