pub mod tenant;

pub use tenant::{ActivationStamps, NewTenantRecord, TenantRecord};
