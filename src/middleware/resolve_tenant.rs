use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::database::{
    ConnectionSource, DatabaseError, PartitionBackend, PartitionName, PgPartitionConnection, TenantDirectory,
};
use crate::error::ApiError;
use crate::tenancy::{Activation, HostLabels, SchemaContext, TenantResolution, TenantResolver};

/// How the request's host relates to the tenant directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Platform host (main subdomain or local development host), shared partition
    Main,
    /// Registered tenant whose partition is active
    Tenant,
    /// Subdomain not present in the directory
    UnknownTenant,
    /// Registered tenant whose partition does not exist (yet); shared partition is active
    PartitionMissing,
}

/// Tenant information attached to each request for downstream handlers
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub subdomain: Option<String>,
    pub is_known_tenant: bool,
    pub partition: PartitionName,
    pub surface: Surface,
}

impl TenantContext {
    fn new(resolution: TenantResolution, activation: &Activation, active: &PartitionName) -> Self {
        let surface = match activation {
            _ if !resolution.is_known_tenant => Surface::UnknownTenant,
            Activation::FellBack { .. } => Surface::PartitionMissing,
            _ if resolution.partition.is_shared() => Surface::Main,
            _ => Surface::Tenant,
        };

        Self {
            subdomain: resolution.canonical_subdomain,
            is_known_tenant: resolution.is_known_tenant,
            partition: active.clone(),
            surface,
        }
    }
}

/// Connection context owned by the request, with the resolved partition active
pub struct RequestConnection<C = PgPartitionConnection>(pub Arc<Mutex<SchemaContext<C>>>);

impl<C> Clone for RequestConnection<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPhase {
    Unresolved,
    Resolving { candidate: Option<String> },
    Active(PartitionName),
    Done,
}

/// Per-request progression from host header to active partition
#[derive(Debug)]
pub struct TenantResolutionFlow {
    phase: ResolutionPhase,
}

impl Default for TenantResolutionFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantResolutionFlow {
    pub fn new() -> Self {
        Self {
            phase: ResolutionPhase::Unresolved,
        }
    }

    pub fn phase(&self) -> &ResolutionPhase {
        &self.phase
    }

    fn advance(&mut self, next: ResolutionPhase) {
        debug!("Tenant resolution {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Resolve `host` and activate the resulting partition on `ctx`.
    ///
    /// Unknown or malformed hosts activate the shared partition; only database failures
    /// are returned as errors.
    pub async fn establish<B, D>(
        &mut self,
        ctx: &mut SchemaContext<B>,
        resolver: &TenantResolver<D>,
        host: Option<&str>,
    ) -> Result<TenantContext, DatabaseError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let labels = HostLabels::parse(host.unwrap_or_default());
        self.advance(ResolutionPhase::Resolving {
            candidate: labels.candidate().map(str::to_string),
        });

        let resolution = resolver.resolve_labels(ctx, &labels).await?;
        let activation = ctx.activate(&resolution.partition).await?;
        if let Activation::FellBack { requested } = &activation {
            if resolution.is_known_tenant {
                warn!(
                    "Tenant {:?} resolved to missing partition {}",
                    resolution.canonical_subdomain, requested
                );
            }
        }

        self.advance(ResolutionPhase::Active(ctx.current_partition().clone()));
        Ok(TenantContext::new(resolution, &activation, ctx.current_partition()))
    }

    pub fn finish(&mut self) {
        self.advance(ResolutionPhase::Done);
    }
}

fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|authority| authority.to_string()))
}

/// Resolves the tenant from the `Host` header, activates its partition on a connection
/// owned by this request and injects `TenantContext` and `RequestConnection`.
/// The partition is left active when the handler returns.
pub async fn resolve_tenant_middleware<S, D>(
    State(state): State<AppState<S, D>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let host = request_host(&request);
    let mut flow = TenantResolutionFlow::new();

    let mut ctx = state.db.acquire().await?;
    let tenant = flow
        .establish(&mut ctx, state.resolver.as_ref(), host.as_deref())
        .await?;

    debug!(
        "Request bound to partition {} (subdomain {:?}, surface {:?})",
        tenant.partition, tenant.subdomain, tenant.surface
    );

    request.extensions_mut().insert(tenant);
    request
        .extensions_mut()
        .insert(RequestConnection(Arc::new(Mutex::new(ctx))));

    let response = next.run(request).await;
    flow.finish();
    Ok(response)
}
