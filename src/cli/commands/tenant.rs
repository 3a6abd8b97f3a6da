use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::services::provisioning::{provision_partition, seed_default_departments};
use crate::services::CreateTenant;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Register a tenant and provision its partition")]
    Create {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,

        #[arg(long, help = "Owning user id")]
        owner: Option<Uuid>,

        #[arg(long, help = "Partition name (generated when omitted)")]
        partition: Option<String>,

        #[arg(long, help = "Register the tenant as inactive")]
        inactive: bool,

        #[arg(long, help = "Only register the tenant, do not create its partition")]
        no_provision: bool,
    },

    #[command(about = "List tenants")]
    List {
        #[arg(long, help = "Only tenants owned by this user id")]
        owner: Option<Uuid>,
    },

    #[command(about = "Show which partition a host resolves to")]
    Resolve {
        #[arg(help = "Host, e.g. acme.example.com")]
        host: String,
    },

    #[command(about = "Mark a tenant active")]
    Activate {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,
    },

    #[command(about = "Mark a tenant inactive")]
    Deactivate {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,
    },

    #[command(about = "Insert the default departments into a tenant's partition")]
    SeedDepartments {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,
    },
}

pub async fn handle(cmd: TenantCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut conn = ctx.connection().await?;

    match cmd {
        TenantCommands::Create {
            subdomain,
            owner,
            partition,
            inactive,
            no_provision,
        } => {
            let request = CreateTenant {
                subdomain,
                owner_id: owner,
                partition,
                is_active: !inactive,
            };
            let tenant = ctx.tenants.create_tenant(&mut conn, request).await?;

            if !no_provision {
                provision_partition(&mut conn, &tenant.partition()?).await?;
            }

            output_success(
                &output_format,
                &format!("Tenant '{}' created with partition '{}'", tenant.subdomain, tenant.schema_name),
                Some(serde_json::to_value(&tenant)?),
            )
        }
        TenantCommands::List { owner } => {
            let tenants = ctx.tenants.list(&mut conn, owner).await?;

            if tenants.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants registered");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
                }
                OutputFormat::Text => {
                    println!("{:<24} {:<28} {:<8} {}", "SUBDOMAIN", "PARTITION", "ACTIVE", "CREATED");
                    println!("{}", "-".repeat(80));

                    for tenant in &tenants {
                        println!(
                            "{:<24} {:<28} {:<8} {}",
                            tenant.subdomain,
                            tenant.schema_name,
                            if tenant.is_active { "yes" } else { "no" },
                            tenant.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Resolve { host } => {
            let resolution = ctx.resolver.resolve(&mut conn, &host).await?;
            let exists = conn.partition_exists(&resolution.partition).await?;

            let mut value = serde_json::to_value(&resolution)?;
            value["host"] = json!(host);
            value["partition_exists"] = json!(exists);
            output_record(&output_format, &value)
        }
        TenantCommands::Activate { subdomain } => {
            let tenant = ctx.tenants.set_active(&mut conn, &subdomain, true).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' activated", tenant.subdomain),
                Some(serde_json::to_value(&tenant)?),
            )
        }
        TenantCommands::Deactivate { subdomain } => {
            let tenant = ctx.tenants.set_active(&mut conn, &subdomain, false).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' deactivated", tenant.subdomain),
                Some(serde_json::to_value(&tenant)?),
            )
        }
        TenantCommands::SeedDepartments { subdomain } => {
            let tenant = ctx.tenants.find_by_subdomain(&mut conn, &subdomain).await?;
            seed_default_departments(&mut conn, &tenant.partition()?).await?;

            output_success(
                &output_format,
                &format!("Default departments seeded for '{}'", tenant.subdomain),
                None,
            )
        }
    }
}
