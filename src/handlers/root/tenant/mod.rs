// handlers/root/tenant/mod.rs - Tenant management handlers
//
// All handlers borrow the shared partition on the request's own connection through
// `TenantService`, so the directory is read and written on the same connection the
// request resolved with.

use serde::Serialize;

use crate::app::AppState;
use crate::database::ConnectionSource;
use crate::database::models::TenantRecord;
use crate::services::ProvisioningStatus;

pub mod create;    // POST /api/root/tenants
pub mod health;    // GET /api/root/tenants/:subdomain/health
pub mod list;      // GET /api/root/tenants
pub mod provision; // POST /api/root/tenants/:subdomain/provision
pub mod show;      // GET /api/root/tenants/:subdomain
pub mod update;    // PATCH /api/root/tenants/:subdomain

pub use create::tenant_create;
pub use health::tenant_health;
pub use list::tenant_list;
pub use provision::tenant_provision;
pub use show::tenant_show;
pub use update::tenant_update;

/// Tenant row together with its last known provisioning state
#[derive(Debug, Serialize)]
pub struct TenantView {
    #[serde(flatten)]
    pub tenant: TenantRecord,
    pub provisioning: Option<ProvisioningStatus>,
}

impl TenantView {
    pub async fn load<S: ConnectionSource, D>(state: &AppState<S, D>, tenant: TenantRecord) -> Self {
        let provisioning = state.provisioner.status(tenant.id).await;
        Self { tenant, provisioning }
    }
}
