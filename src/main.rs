mod aggregate;
mod benchmark;
mod cli;
mod config;
mod error;
mod exec_utils;
mod http_probe;
mod parsers;
mod process;
mod report;
mod wrk;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::exec_utils::*;
    pub use tracing::{debug, error, info, trace, warn};
}

use std::path::Path;

use clap::Parser;
use dotenvy::dotenv;
use prelude::*;
use tracing_subscriber::EnvFilter;

use crate::benchmark::Orchestrator;
use crate::config::BenchmarkConfig;
use crate::process::NativeProcessManager;
use crate::wrk::WrkRunner;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!(
        "{} v{}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION")
    );

    let cli = cli::Cli::parse();
    let config = match BenchmarkConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", cli.config.display(), e);
            return Ok(());
        }
    };
    log_config(&config);
    if !cli.skip_versions {
        log_tool_versions(&config).await;
    }

    let processes = match NativeProcessManager::new(config.production_env.clone()) {
        Ok(processes) => processes,
        Err(e) => {
            error!("Failed to set up the health probe: {}", e);
            return Ok(());
        }
    };
    let orchestrator = Orchestrator::new(config, processes, WrkRunner);
    let results = orchestrator.run_all().await;

    let config = orchestrator.config();
    let ranked = report::rank(results);
    report::log_ranking(&ranked);
    report::log_comparisons(&report::compare_runtimes(&ranked, &config.comparison));
    report::write_artifacts(
        Path::new(&config.output.json),
        Path::new(&config.output.csv),
        &ranked,
    );

    Ok(())
}

fn log_config(config: &BenchmarkConfig) {
    info!("Configuration:");
    info!("- Connections: {}", config.wrk.connections);
    info!("- Threads: {}", config.wrk.threads);
    info!("- Duration: {}", config.wrk.duration);
    info!("- Timeout: {}", config.wrk.timeout);
    info!("- Runs per setup: {}", config.runs);
    info!("- Warmup time: {}ms", config.warmup_ms);
    info!("- Cooldown time: {}ms", config.cooldown_ms);
    info!("- Latency statistics: {}", config.wrk.latency);
    info!("- Pairings: {}", config.pairings.len());
}

async fn log_tool_versions(config: &BenchmarkConfig) {
    info!("=== Runtime Versions ===");
    let mut tools: Vec<&str> = config.runtimes();
    tools.push(&config.wrk.binary);
    for tool in tools {
        match tool_version(tool).await {
            Some(version) => info!("{}: {}", tool, version),
            None => warn!("{}: Not available", tool),
        }
    }
}
