use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tokio::sync::OnceCell;

use scalesphere_api::config::AppConfig;
use scalesphere_api::database::{ConnectionSource, DatabaseError, DatabaseManager};
use scalesphere_api::services::provisioning::migrate_shared;

static SERVER: OnceLock<TestServer> = OnceLock::new();
static SHARED_SCHEMA: OnceCell<()> = OnceCell::const_new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_scalesphere-api"));
        cmd.env("API_PORT", port.to_string())
            // Fail fast when no database is reachable
            .env("DATABASE_CONNECTION_TIMEOUT", "2")
            .env("API_ENABLE_REQUEST_LOGGING", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server can see DATABASE_URL from .env (loaded by the server)
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// Database the server under test talks to, from the environment or `.env`
#[allow(dead_code)]
pub fn database_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Apply the shared migrations once per test binary
#[allow(dead_code)]
pub async fn prepare_database(url: &str) -> Result<()> {
    SHARED_SCHEMA
        .get_or_try_init(|| async {
            let mut config = AppConfig::development().database;
            config.url = Some(url.to_string());

            let db = DatabaseManager::connect_lazy(&config)?;
            let result: Result<usize, DatabaseError> = async {
                let mut ctx = db.acquire().await?;
                migrate_shared(&mut ctx).await
            }
            .await;
            db.close().await;

            result.map(|_| ()).context("failed to apply shared migrations")
        })
        .await?;
    Ok(())
}
