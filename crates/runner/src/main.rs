use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use volley_core::{Caller, Config, Dispatcher, HttpCaller, MockCaller, RunReport};

#[derive(Parser, Debug)]
#[command(name = "runner")]
#[command(about = "Volley runner - fires a bounded batch of GET requests and reports the outcome")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Call mode: mock or http
    #[arg(long, default_value = "http")]
    mode: String,

    /// Target URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Number of calls to issue (overrides config)
    #[arg(long)]
    tasks: Option<u64>,

    /// Maximum concurrent in-flight calls (overrides config)
    #[arg(long)]
    concurrency: Option<u64>,

    /// Pacing pause in milliseconds, 0 disables (overrides config)
    #[arg(long)]
    pacing_ms: Option<u64>,
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
    if let Some(tasks) = args.tasks {
        config.run.task_count = tasks;
    }
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        config.run.pacing_ms = pacing_ms;
    }

    let caller: Arc<dyn Caller> = match args.mode.as_str() {
        "mock" => Arc::new(MockCaller::new(5)), // 5ms simulated latency
        "http" => Arc::new(
            HttpCaller::new(&config.target.url, config.target.timeout_ms)
                .context("Failed to create HTTP caller")?,
        ),
        _ => anyhow::bail!("Invalid mode: {}, must be 'mock' or 'http'", args.mode),
    };

    info!("Using caller: {}", caller.name());
    info!("Target: {}", config.target.url);

    let dispatcher = Dispatcher::new(caller, config.dispatch_options());
    let report = dispatcher.run().await?;

    if let Some(dir) = &config.output.results_dir {
        let path = write_report(dir, &report)?;
        info!("Report written to {}", path);
    }

    print_summary(&report);

    Ok(())
}

fn write_report(dir: &str, report: &RunReport) -> Result<String> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = format!("{}/run_{}.json", dir, timestamp);

    std::fs::create_dir_all(dir).ok();
    let report_json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, report_json)?;

    Ok(path)
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;

    println!("\n=== Run Summary ===");
    println!("Calls: {}", summary.total_tasks);
    println!("Succeeded: {}", summary.success_count);
    println!("HTTP errors: {}", summary.http_errors);
    println!("Transport errors: {}", summary.transport_errors);
    println!("Peak in-flight: {}", summary.peak_in_flight);
    println!("Duration: {}ms", summary.duration_ms);
    println!("Latency p50: {}ms", summary.latency_p50_ms);
    println!("Latency p95: {}ms", summary.latency_p95_ms);
    println!("Latency p99: {}ms", summary.latency_p99_ms);
    println!();
}
