//! trivy-metrics-exporter binary.
//!
//! Syncs the report cache from a snapshot file, registers the report
//! collector on the leader and serves `/metrics` over HTTP.

mod cli;
mod commands;
mod handlers;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use prometheus::{Gauge, Registry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{debug, error, info, warn, Level};

use cli::{resolve_config, Args, Commands, LogLevel};
use commands::{command_collect, command_config, show_config};
use handlers::{health_handler, metrics_handler, root_handler};
use state::AppState;
use trivy_metrics_exporter::cache_updater::{run_resync_loop, sync_from_file};
use trivy_metrics_exporter::config::{
    validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use trivy_metrics_exporter::{
    start_if_leader, CollectorRunner, ReportCache, ResourcesMetricsCollector,
};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };

    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Future that resolves once `true` is published on the shutdown channel.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender also counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), *format, *commented),

            Commands::Collect {
                snapshot,
                namespaces,
            } => {
                let config = load_validated_config(&args)?;
                command_collect(snapshot.clone(), namespaces.clone(), &config)
                    .map_err(|e| e.into())
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting trivy-metrics-exporter");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    let scrape_duration = Gauge::new(
        "trivy_metrics_exporter_scrape_duration_seconds",
        "Time spent serving the previous /metrics request",
    )?;
    let cache_synced = Gauge::new(
        "trivy_metrics_exporter_cache_synced",
        "Whether the report cache has completed its initial sync (1) or not (0)",
    )?;

    registry.register(Box::new(scrape_duration.clone()))?;
    registry.register(Box::new(cache_synced.clone()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // Initial report cache sync
    let cache = Arc::new(ReportCache::new());
    match &config.snapshot_path {
        Some(path) => {
            info!("Performing initial report cache sync from {}", path.display());
            match sync_from_file(&cache, path) {
                Ok(counts) => info!("Report cache synced: {} reports", counts.total()),
                Err(e) => error!("Initial report cache sync failed: {}", e),
            }

            tasks.push(tokio::spawn(run_resync_loop(
                cache.clone(),
                path.clone(),
                Duration::from_secs(config.resync_interval_seconds()),
                wait_for_shutdown(shutdown_rx.clone()),
            )));
        }
        None => warn!("No report snapshot configured - report cache stays unsynced"),
    }

    // Register the report collector on the leader only
    let collector = ResourcesMetricsCollector::from_config(cache.clone(), &config)?;
    let runner = Arc::new(CollectorRunner::new(collector, registry.clone()));
    let runner = if start_if_leader(&runner, config.is_leader()) {
        let task_runner = runner.clone();
        let shutdown = wait_for_shutdown(shutdown_rx.clone());
        tasks.push(tokio::spawn(async move {
            if let Err(e) = task_runner.run(shutdown).await {
                error!("Resources metrics collector failed: {}", e);
            }
        }));
        Some(runner)
    } else {
        None
    };

    let state = Arc::new(AppState {
        registry,
        scrape_duration,
        cache_synced,
        cache,
        config: Arc::new(config.clone()),
        runner,
        start_time: Instant::now(),
    });

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(
        "trivy-metrics-exporter listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                let _ = shutdown_tx.send(true);
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    info!("trivy-metrics-exporter stopped gracefully");
    Ok(())
}
