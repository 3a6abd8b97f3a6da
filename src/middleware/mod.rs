pub mod require_tenant;
pub mod resolve_tenant;
pub mod response;

pub use require_tenant::{require_known_tenant, require_main_surface};
pub use resolve_tenant::{
    resolve_tenant_middleware, RequestConnection, ResolutionPhase, Surface, TenantContext,
    TenantResolutionFlow,
};
pub use response::{ApiResponse, ApiResult};
