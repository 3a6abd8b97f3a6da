use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::config::TenancyConfig;
use crate::database::{DatabaseError, PartitionBackend, PartitionName, TenantDirectory};
use crate::tenancy::SchemaContext;

/// Labels of a request host relevant to tenant lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLabels {
    leftmost: Option<String>,
    candidate: Option<String>,
}

impl HostLabels {
    /// Parse a `Host` header value. The port is dropped, case folded and a trailing dot
    /// removed. Only hosts with at least three labels carry a tenant subdomain, and IP
    /// literals never do.
    pub fn parse(host: &str) -> Self {
        let host = host.trim();
        let name = if let Some(rest) = host.strip_prefix('[') {
            // [v6]:port
            rest.split(']').next().unwrap_or_default()
        } else if host.matches(':').count() > 1 {
            host
        } else {
            host.split(':').next().unwrap_or_default()
        };
        let name = name.trim_end_matches('.').to_ascii_lowercase();

        if name.is_empty() {
            return Self { leftmost: None, candidate: None };
        }
        if name.parse::<IpAddr>().is_ok() {
            return Self { leftmost: Some(name), candidate: None };
        }

        let labels: Vec<&str> = name.split('.').collect();
        let leftmost = labels.first().map(|label| label.to_string()).filter(|l| !l.is_empty());
        let candidate = if labels.len() >= 3 { leftmost.clone() } else { None };

        Self { leftmost, candidate }
    }

    pub fn leftmost(&self) -> Option<&str> {
        self.leftmost.as_deref()
    }

    /// The tenant subdomain candidate, if the host has one
    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }
}

/// Which partition a host maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantResolution {
    pub partition: PartitionName,
    pub is_known_tenant: bool,
    pub canonical_subdomain: Option<String>,
}

impl TenantResolution {
    fn shared(is_known_tenant: bool, canonical_subdomain: Option<String>) -> Self {
        Self {
            partition: PartitionName::shared(),
            is_known_tenant,
            canonical_subdomain,
        }
    }
}

/// Maps hosts to tenant partitions using the tenant directory
pub struct TenantResolver<D> {
    directory: Arc<D>,
    main_subdomain: String,
    local_host: String,
}

impl<D> TenantResolver<D> {
    pub fn new(directory: Arc<D>, config: &TenancyConfig) -> Self {
        Self {
            directory,
            main_subdomain: config.main_subdomain.clone(),
            local_host: config.local_host.clone(),
        }
    }

    fn is_platform_label(&self, label: &str) -> bool {
        label == self.local_host || label == self.main_subdomain
    }

    /// Resolve `host` without changing the connection's active partition
    pub async fn resolve<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        host: &str,
    ) -> Result<TenantResolution, DatabaseError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        self.resolve_labels(ctx, &HostLabels::parse(host)).await
    }

    pub async fn resolve_labels<B>(
        &self,
        ctx: &mut SchemaContext<B>,
        labels: &HostLabels,
    ) -> Result<TenantResolution, DatabaseError>
    where
        B: PartitionBackend,
        D: TenantDirectory<B> + 'static,
    {
        let candidate = match labels.candidate() {
            Some(label) if !self.is_platform_label(label) => label.to_string(),
            Some(label) => return Ok(TenantResolution::shared(true, Some(label.to_string()))),
            // Apex domains and IP literals carry no subdomain; only the local host names itself
            None => {
                let local = labels.leftmost().filter(|label| *label == self.local_host);
                return Ok(TenantResolution::shared(true, local.map(str::to_string)));
            }
        };

        let directory = Arc::clone(&self.directory);
        let subdomain = candidate.clone();
        let previous = ctx.current_partition().clone();
        let record = ctx
            .with_shared_partition(Some(previous), move |ctx| {
                Box::pin(async move { directory.find_by_subdomain(ctx.connection(), &subdomain).await })
            })
            .await?;

        match record {
            Some(tenant) => {
                debug!("Resolved subdomain {} to partition {}", tenant.subdomain, tenant.schema_name);
                Ok(TenantResolution {
                    partition: tenant.partition()?,
                    is_known_tenant: true,
                    canonical_subdomain: Some(tenant.subdomain),
                })
            }
            None => {
                debug!("Subdomain {} is not a registered tenant", candidate);
                Ok(TenantResolution::shared(false, Some(candidate)))
            }
        }
    }
}
