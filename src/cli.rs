//! CLI arguments and subcommands for trivy-metrics-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands, and merges them over the
//! loaded configuration file.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

use trivy_metrics_exporter::config::{
    load_config, parse_namespace_list, Config, ConfigFormat, TARGET_NAMESPACES_ENV,
};

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "trivy-metrics-exporter",
    about = "Prometheus exporter for cached Trivy security reports",
    long_about = "Prometheus exporter for cached Trivy security reports.\n\n\
                  Serves per-severity gauges for vulnerability, exposed secret and \
                  configuration audit reports. Metrics are computed on every scrape \
                  from an in-process report cache.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Namespaces to collect reports from (comma-separated, empty = all)
    #[arg(long, env = TARGET_NAMESPACES_ENV)]
    pub target_namespaces: Option<String>,

    /// Report snapshot file (JSON/YAML) the cache is synced from
    #[arg(short = 's', long)]
    pub snapshot: Option<PathBuf>,

    /// Seconds between report cache resyncs
    #[arg(long)]
    pub resync_interval: Option<u64>,

    /// Run as a non-leader replica (leader-only collectors stay idle)
    #[arg(long)]
    pub no_leader: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single collection pass over a snapshot and print the metrics
    Collect {
        /// Report snapshot file (defaults to the configured snapshot)
        #[arg(short = 's', long)]
        snapshot: Option<PathBuf>,

        /// Namespaces to collect (comma-separated, overrides config)
        #[arg(short = 'n', long)]
        namespaces: Option<String>,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

/// Effective configuration: CLI > config file > defaults.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(namespaces) = &args.target_namespaces {
        config.target_namespaces = Some(parse_namespace_list(namespaces));
    }

    if let Some(snapshot) = &args.snapshot {
        config.snapshot_path = Some(snapshot.clone());
    }

    if let Some(interval) = args.resync_interval {
        config.resync_interval_seconds = Some(interval);
    }

    if args.no_leader {
        config.leader = Some(false);
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }

    config.log_level = Some(format!("{:?}", args.log_level).to_lowercase());

    Ok(config)
}
