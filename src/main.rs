//! statusboard - HTTP status dashboard backend
//!
//! Probes a fixed list of endpoints, keeps hourly and daily history in a
//! JSON document, and serves both over a JSON API.
//!
//! Commands:
//! - `serve` (default): background checks plus the web server
//! - `check`: run one check cycle, write the document, exit
//! - `analyze`: print a summary of the persisted document

mod config;
mod db;
mod probe;
mod report;
mod scheduler;
mod web;

#[cfg(test)]
mod testing;

use config::ServerConfig;
use db::Store;
use probe::{ProbeConfig, Prober};
use scheduler::{Monitor, Scheduler};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("statusboard=info".parse()?))
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());
    if !matches!(command.as_str(), "serve" | "check" | "analyze") {
        return Err(format!("unknown command {:?} (expected serve, check or analyze)", command).into());
    }

    // Load configuration
    let cfg = ServerConfig::load();
    cfg.validate()?;
    let store = Arc::new(Store::new(&cfg.data_path));
    tracing::info!("Using status document at {}", cfg.data_path);

    if command == "analyze" {
        print!("{}", report::analyze(&store, &cfg.retention));
        return Ok(());
    }

    let targets = cfg.load_targets()?;
    tracing::info!("Loaded {} targets", targets.len());

    let prober = Prober::new(ProbeConfig::new(cfg.probe_timeout))?;
    let monitor = Arc::new(Monitor::new(
        targets,
        prober,
        store.clone(),
        cfg.retention,
        cfg.cache_ttl,
    ));

    if command == "check" {
        let snapshot = monitor.run_cycle().await?;
        tracing::info!(
            "Status document updated: {} ({} sites)",
            snapshot.metrics.status,
            snapshot.sites.len()
        );
        return Ok(());
    }

    tracing::info!("Starting statusboard on port {}...", cfg.http_port);

    // Start background checks
    let scheduler = Scheduler::new(monitor.clone(), cfg.check_interval);
    scheduler.start().await;

    // Start web server
    let server = Server::new(cfg, store, monitor);
    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    scheduler.stop().await;

    Ok(())
}
