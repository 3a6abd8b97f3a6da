pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::config;
use crate::database::{ConnectionSource, DatabaseManager, PgPartitionConnection, PgTenantDirectory};
use crate::services::TenantService;
use crate::tenancy::{SchemaContext, TenantResolver};

#[derive(Parser)]
#[command(name = "scalesphere")]
#[command(about = "ScaleSphere CLI - tenant and partition administration")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "DATABASE_URL", help = "Database connection URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply shared migrations, then tenant migrations to every provisioned tenant")]
    Migrate,

    #[command(about = "Partition management")]
    Schema {
        #[command(subcommand)]
        cmd: commands::schema::SchemaCommands,
    },

    #[command(about = "Tenant directory management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Database handles shared by all commands
pub struct CliContext {
    pub db: DatabaseManager,
    pub tenants: TenantService<PgTenantDirectory>,
    pub resolver: TenantResolver<PgTenantDirectory>,
}

impl CliContext {
    pub fn new(database_url: Option<String>) -> anyhow::Result<Self> {
        let mut config = config().clone();
        if database_url.is_some() {
            config.database.url = database_url;
        }

        let db = DatabaseManager::connect_lazy(&config.database)
            .context("failed to configure database pool")?;
        let directory = Arc::new(PgTenantDirectory);

        Ok(Self {
            tenants: TenantService::new(Arc::clone(&directory), config.tenancy.clone()),
            resolver: TenantResolver::new(directory, &config.tenancy),
            db,
        })
    }

    pub async fn connection(&self) -> anyhow::Result<SchemaContext<PgPartitionConnection>> {
        self.db.acquire().await.context("failed to connect to database")
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let ctx = CliContext::new(cli.database_url)?;

    let result = match cli.command {
        Commands::Migrate => commands::schema::migrate_all(&ctx, output_format).await,
        Commands::Schema { cmd } => commands::schema::handle(cmd, &ctx, output_format).await,
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, &ctx, output_format).await,
    };

    ctx.db.close().await;
    result
}
