// Tenant surfaces against a real PostgreSQL database. Skipped when DATABASE_URL is unset.
mod common;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

macro_rules! require_database {
    () => {
        match common::database_url() {
            Some(url) => {
                common::prepare_database(&url).await?;
                common::ensure_server().await?
            }
            None => {
                eprintln!("DATABASE_URL not set, skipping");
                return Ok(());
            }
        }
    };
}

fn unique_subdomain() -> String {
    format!("it-{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

/// Register `subdomain` from the main site and wait for its partition to be provisioned
async fn register_tenant(server: &common::TestServer, client: &Client, subdomain: &str) -> Result<Value> {
    let res = client
        .post(server.url("/api/root/tenants"))
        .header("host", "localhost")
        .json(&json!({ "subdomain": subdomain }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let tenant = res.json::<Value>().await?["data"].clone();

    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let health = client
            .get(server.url(&format!("/api/root/tenants/{}/health", subdomain)))
            .header("host", "localhost")
            .send()
            .await?;
        assert_eq!(health.status(), StatusCode::OK);
        let body = health.json::<Value>().await?;

        if body["data"]["provisioning"]["state"] == "failed" {
            anyhow::bail!("provisioning failed: {}", body["data"]["provisioning"]["error"]);
        }
        if body["data"]["partition_exists"] == true && body["data"]["provisioning"]["state"] == "completed" {
            assert_eq!(body["data"]["provisioning"]["seeded"], true);
            return Ok(tenant);
        }
        if Instant::now() > deadline {
            anyhow::bail!("tenant {} was not provisioned in time", subdomain);
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

#[tokio::test]
async fn known_tenant_requests_run_on_its_partition() -> Result<()> {
    let server = require_database!();
    let client = Client::new();
    let subdomain = unique_subdomain();

    let tenant = register_tenant(server, &client, &subdomain).await?;
    let partition = tenant["schema_name"].as_str().context("schema_name missing")?.to_string();
    assert!(partition.starts_with("tenant_"), "unexpected partition {}", partition);

    let res = client
        .get(server.url("/api/tenant"))
        .header("host", format!("{}.example.com", subdomain))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["subdomain"], subdomain.as_str());
    assert_eq!(body["data"]["surface"], "tenant");
    assert_eq!(body["data"]["partition"], partition.as_str());
    assert_eq!(body["data"]["connection_partition"], partition.as_str());
    Ok(())
}

#[tokio::test]
async fn tenant_hosts_cannot_reach_root_routes() -> Result<()> {
    let server = require_database!();
    let client = Client::new();
    let subdomain = unique_subdomain();
    register_tenant(server, &client, &subdomain).await?;

    let res = client
        .get(server.url("/api/root/tenants"))
        .header("host", format!("{}.example.com", subdomain))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_tenant_is_not_found() -> Result<()> {
    let server = require_database!();
    let client = Client::new();

    let res = client
        .get(server.url("/api/tenant"))
        .header("host", format!("{}.example.com", unique_subdomain()))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Database details never reach clients
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], true);
    assert!(!body["message"].as_str().unwrap_or_default().contains("sqlx"));
    Ok(())
}

#[tokio::test]
async fn invalid_signups_are_rejected() -> Result<()> {
    let server = require_database!();
    let client = Client::new();

    for body in [
        json!({ "subdomain": "admin" }),
        json!({ "subdomain": unique_subdomain(), "partition": "pg_catalog" }),
        json!({ "subdomain": unique_subdomain(), "partition": "information_schema" }),
    ] {
        let res = client
            .post(server.url("/api/root/tenants"))
            .header("host", "localhost")
            .json(&body)
            .send()
            .await?;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "signup {}", body);
    }
    Ok(())
}

#[tokio::test]
async fn unmatched_paths_are_not_found() -> Result<()> {
    let server = require_database!();

    let res = Client::new()
        .get(server.url("/api/nope"))
        .header("host", "acme.example.com")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
