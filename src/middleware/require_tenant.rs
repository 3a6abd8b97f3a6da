use axum::{extract::Request, middleware::Next, response::Response};

use super::resolve_tenant::{Surface, TenantContext};
use crate::error::ApiError;

fn surface_of(request: &Request) -> Result<(Surface, Option<String>), ApiError> {
    request
        .extensions()
        .get::<TenantContext>()
        .map(|tenant| (tenant.surface, tenant.subdomain.clone()))
        .ok_or_else(|| ApiError::internal_server_error("Tenant resolution required before tenant checks"))
}

/// Rejects requests whose host is not a registered tenant with a usable partition
pub async fn require_known_tenant(request: Request, next: Next) -> Result<Response, ApiError> {
    let (surface, subdomain) = surface_of(&request)?;

    match surface {
        Surface::Tenant | Surface::Main => Ok(next.run(request).await),
        Surface::UnknownTenant => {
            tracing::warn!("Rejected request for unknown tenant {:?}", subdomain);
            Err(ApiError::not_found(format!(
                "Tenant '{}' does not exist",
                subdomain.unwrap_or_default()
            )))
        }
        Surface::PartitionMissing => Err(ApiError::service_unavailable(
            "Tenant workspace is not available yet",
        )),
    }
}

/// Restricts platform administration routes to the main surface
pub async fn require_main_surface(request: Request, next: Next) -> Result<Response, ApiError> {
    let (surface, subdomain) = surface_of(&request)?;

    if surface != Surface::Main {
        tracing::warn!("Rejected platform route on {:?} surface ({:?})", surface, subdomain);
        return Err(ApiError::forbidden("Only available on the main site"));
    }

    Ok(next.run(request).await)
}
