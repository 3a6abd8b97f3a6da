use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::{CliContext, OutputFormat};
use crate::database::PartitionName;
use crate::services::provisioning::{migrate_partition, migrate_shared, provision_partition};

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Create a partition and apply tenant migrations to it; a new partition is seeded")]
    Init {
        #[arg(help = "Partition name")]
        partition: String,
    },

    #[command(about = "Check whether a partition exists")]
    Exists {
        #[arg(help = "Partition name")]
        partition: String,
    },
}

pub async fn handle(cmd: SchemaCommands, ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::Init { partition } => {
            let partition = PartitionName::parse(&partition)?;
            if partition.is_shared() {
                anyhow::bail!("use `migrate` for the shared partition");
            }

            let mut conn = ctx.connection().await?;
            let outcome = provision_partition(&mut conn, &partition).await?;

            output_success(
                &output_format,
                &format!(
                    "Partition '{}' initialised ({} migrations{})",
                    partition,
                    outcome.migrations_applied,
                    if outcome.seeded { ", seeded" } else { "" }
                ),
                Some(json!({
                    "partition": partition,
                    "migrations_applied": outcome.migrations_applied,
                    "seeded": outcome.seeded,
                })),
            )
        }
        SchemaCommands::Exists { partition } => {
            let partition = PartitionName::parse(&partition)?;
            let mut conn = ctx.connection().await?;
            let exists = conn.partition_exists(&partition).await?;

            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "partition": partition, "exists": exists }))?
                ),
                OutputFormat::Text => println!(
                    "{}: {}",
                    partition,
                    if exists { "exists" } else { "missing" }
                ),
            }
            Ok(())
        }
    }
}

/// Shared migrations first, then tenant migrations on every tenant whose partition exists.
/// Partitions are never created or seeded here; unprovisioned tenants are reported.
pub async fn migrate_all(ctx: &CliContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut conn = ctx.connection().await?;
    let shared = migrate_shared(&mut conn).await?;

    let tenants = ctx.tenants.list(&mut conn, None).await?;
    let mut migrated = Vec::with_capacity(tenants.len());
    let mut unprovisioned = Vec::new();
    for tenant in &tenants {
        let partition = tenant.partition()?;
        if !conn.partition_exists(&partition).await? {
            tracing::warn!("Skipping tenant {}: partition {} does not exist", tenant.subdomain, partition);
            unprovisioned.push(json!({ "subdomain": tenant.subdomain, "partition": partition }));
            continue;
        }

        let applied = migrate_partition(&mut conn, &partition).await?;
        if let OutputFormat::Text = output_format {
            println!("  {} ({}, {} migrations)", tenant.subdomain, partition, applied);
        }
        migrated.push(json!({ "subdomain": tenant.subdomain, "partition": partition }));
    }

    output_success(
        &output_format,
        &format!(
            "Applied {} shared migrations and migrated {} tenants ({} unprovisioned)",
            shared,
            migrated.len(),
            unprovisioned.len()
        ),
        Some(json!({ "shared_migrations": shared, "tenants": migrated, "unprovisioned": unprovisioned })),
    )
}
