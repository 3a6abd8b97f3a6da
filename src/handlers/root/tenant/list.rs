// handlers/root/tenant/list.rs - GET /api/root/tenants[?owner=uuid]

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use super::TenantView;
use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};
use crate::middleware::{ApiResponse, ApiResult, RequestConnection};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: Option<Uuid>,
}

pub async fn tenant_list<S, D>(
    State(state): State<AppState<S, D>>,
    Extension(conn): Extension<RequestConnection<S::Conn>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<TenantView>>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let tenants = {
        let mut ctx = conn.0.lock().await;
        state.tenants.list(&mut *ctx, query.owner).await?
    };

    let mut views = Vec::with_capacity(tenants.len());
    for tenant in tenants {
        views.push(TenantView::load(&state, tenant).await);
    }

    Ok(ApiResponse::success(views))
}
