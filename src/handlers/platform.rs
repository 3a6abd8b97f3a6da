// handlers/platform.rs - Service info and liveness, served without tenant resolution

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::{ConnectionSource, TenantDirectory};

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "ScaleSphere API",
            "version": version,
            "description": "Multi-tenant HR and attendance API with schema-per-tenant isolation",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "tenant": "/api/tenant (tenant subdomain)",
                "root": "/api/root/tenants[/:subdomain[/provision|/health]] (main site only)",
            }
        }
    }))
}

/// GET /health - database connectivity
pub async fn health<S, D>(State(state): State<AppState<S, D>>) -> impl IntoResponse
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}
