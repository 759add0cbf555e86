use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;
use volley_core::Config;

#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(about = "Preflight check for volley runs - validates and probes the target endpoint")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target URL (overrides config)
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(url) = args.url {
        config.target.url = url;
    }

    let target = validate_target_url(&config.target.url)
        .with_context(|| format!("Invalid target.url: {}", config.target.url))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.target.timeout_ms.max(1)))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    println!();
    println!("=== Preflight ===");
    println!("Target: {target}");
    println!("Expected status: {}", config.target.expect_status);
    println!();

    if !probe_target(&client, &target, config.target.expect_status).await {
        anyhow::bail!(
            "Preflight failed: target did not return {}",
            config.target.expect_status
        );
    }

    println!();
    println!("Preflight OK.");
    Ok(())
}

fn validate_target_url(raw: &str) -> Result<url::Url> {
    let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("Target URL must be http:// or https:// (got {raw})");
    }
    if !url.username().is_empty() || url.password().is_some() {
        anyhow::bail!("Target URL must not include credentials (got {raw})");
    }
    url.host_str()
        .context("Target URL must include a hostname")?;

    Ok(url)
}

async fn probe_target(client: &reqwest::Client, url: &url::Url, expect_status: u16) -> bool {
    let start = Instant::now();
    let resp = client.get(url.clone()).send().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match resp {
        Ok(r) => {
            let status = r.status().as_u16();
            println!("GET {} -> {} ({}ms)", url, status, latency_ms);
            if status != expect_status {
                warn!(
                    "Target returned {} instead of the expected {}",
                    status, expect_status
                );
                false
            } else {
                true
            }
        }
        Err(e) => {
            println!("GET {} -> ERROR ({}ms)", url, latency_ms);
            warn!("Target request failed: {}", e);
            false
        }
    }
}
