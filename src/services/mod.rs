pub mod provisioning;
pub mod tenant_service;

pub use provisioning::{Provisioner, ProvisioningStatus, ProvisioningTracker};
pub use tenant_service::{CreateTenant, TenantError, TenantService};
