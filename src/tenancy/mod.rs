pub mod context;
pub mod resolver;

pub use context::{Activation, SchemaContext, ScopeOptions};
pub use resolver::{HostLabels, TenantResolution, TenantResolver};
