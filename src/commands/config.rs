//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use trivy_metrics_exporter::config::{render_config, Config, ConfigFormat};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("trivy-metrics-exporter.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Prints the effective configuration.
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Trivy Metrics Exporter Configuration
# ====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                     # HTTP port
#
# Collection Scope
# ----------------
# target_namespaces: null        # Namespaces to collect from (null or [] = all)
#
# Report Cache
# ------------
# snapshot_path: null            # JSON/YAML report snapshot the cache syncs from
# resync_interval_seconds: 30    # Seconds between cache resyncs
#
# Leadership
# ----------
# leader: true                   # Only the leader registers the report collector
#
# Feature Flags
# -------------
# enable_health: true            # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"              # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
