//! Configuration management for trivy-metrics-exporter.
//!
//! This module handles loading and validating configuration files. It
//! supports YAML, JSON and TOML formats; CLI overrides are applied on top
//! by the binary.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_RESYNC_INTERVAL: u64 = 30;

/// Environment variable holding a comma-separated target namespace list.
pub const TARGET_NAMESPACES_ENV: &str = "TRIVY_METRICS_TARGET_NAMESPACES";

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection scope
    /// Namespaces to collect reports from. Empty or unset means all.
    #[serde(alias = "target-namespaces")]
    pub target_namespaces: Option<Vec<String>>,

    // Report cache
    /// Report snapshot file the cache is synced from
    #[serde(alias = "snapshot-path")]
    pub snapshot_path: Option<PathBuf>,
    #[serde(alias = "resync-interval-seconds")]
    pub resync_interval_seconds: Option<u64>,

    /// Whether this replica holds leadership for leader-only tasks
    pub leader: Option<bool>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            target_namespaces: None,
            snapshot_path: None,
            resync_interval_seconds: Some(DEFAULT_RESYNC_INTERVAL),
            leader: Some(true),
            enable_health: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    /// Effective target namespaces: trimmed, empties dropped, duplicates
    /// removed keeping the first occurrence.
    pub fn target_namespaces(&self) -> Vec<String> {
        normalize_namespaces(self.target_namespaces.iter().flatten())
    }

    pub fn resync_interval_seconds(&self) -> u64 {
        self.resync_interval_seconds
            .unwrap_or(DEFAULT_RESYNC_INTERVAL)
    }

    pub fn is_leader(&self) -> bool {
        self.leader.unwrap_or(true)
    }
}

/// Trims namespace names, drops empty ones and removes duplicates keeping
/// the first occurrence. An empty result means all namespaces.
pub fn normalize_namespaces<I, S>(namespaces: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for ns in namespaces {
        let ns = ns.as_ref().trim();
        if !ns.is_empty() && !normalized.iter().any(|n| n == ns) {
            normalized.push(ns.to_string());
        }
    }
    normalized
}

/// Splits a comma-separated namespace list.
pub fn parse_namespace_list(value: &str) -> Vec<String> {
    normalize_namespaces(value.split(','))
}

/// Checks every namespace is a valid RFC 1123 label.
pub fn validate_namespaces(namespaces: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    match namespaces.iter().find(|ns| !is_valid_namespace(ns)) {
        Some(ns) => Err(format!("Invalid target namespace '{}'", ns).into()),
        None => Ok(()),
    }
}

/// RFC 1123 label check used for namespace names.
fn is_valid_namespace(ns: &str) -> bool {
    let bytes = ns.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.port == Some(0) {
        return Err("port must be between 1 and 65535".into());
    }

    if cfg.resync_interval_seconds == Some(0) {
        return Err("resync_interval_seconds must be greater than 0".into());
    }

    validate_namespaces(&cfg.target_namespaces())?;

    if let Some(path) = &cfg.snapshot_path {
        if !path.exists() {
            return Err(format!("Report snapshot file not found: {}", path.display()).into());
        }
    }

    Ok(())
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/trivy-metrics/exporter.yaml",
            "/etc/trivy-metrics/exporter.yml",
            "/etc/trivy-metrics/exporter.json",
            "./trivy-metrics-exporter.yaml",
            "./trivy-metrics-exporter.yml",
            "./trivy-metrics-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_default()
    };

    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_target_namespaces_normalized() {
        let cfg = Config {
            target_namespaces: Some(vec![
                " ns1 ".into(),
                "".into(),
                "ns2".into(),
                "ns1".into(),
            ]),
            ..Config::default()
        };
        assert_eq!(cfg.target_namespaces(), vec!["ns1", "ns2"]);
    }

    #[test]
    fn test_unset_target_namespaces_is_empty() {
        assert!(Config::default().target_namespaces().is_empty());
    }

    #[test]
    fn test_parse_namespace_list() {
        assert_eq!(parse_namespace_list("a, b,,c "), vec!["a", "b", "c"]);
        assert_eq!(parse_namespace_list("ns1,ns1, ns2"), vec!["ns1", "ns2"]);
        assert!(parse_namespace_list("").is_empty());
    }

    #[test]
    fn test_validate_namespaces() {
        assert!(validate_namespaces(&["ns1".to_string(), "kube-system".to_string()]).is_ok());
        assert!(validate_namespaces(&["ns1".to_string(), "Bad_NS".to_string()]).is_err());
        assert!(validate_namespaces(&[]).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_namespace() {
        let cfg = Config {
            target_namespaces: Some(vec!["Not_Valid".into()]),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_resync_interval() {
        let cfg = Config {
            resync_interval_seconds: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_namespace_label_rules() {
        assert!(is_valid_namespace("kube-system"));
        assert!(is_valid_namespace("ns1"));
        assert!(!is_valid_namespace("-ns"));
        assert!(!is_valid_namespace("ns-"));
        assert!(!is_valid_namespace(&"a".repeat(64)));
    }

    #[test]
    fn test_load_yaml_config() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9300\ntarget_namespaces: [ns1, ns2]\nleader: false").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.port, Some(9300));
        assert_eq!(cfg.target_namespaces(), vec!["ns1", "ns2"]);
        assert!(!cfg.is_leader());
        // Fields missing from the file fall back to their accessor defaults.
        assert_eq!(cfg.resync_interval_seconds(), DEFAULT_RESYNC_INTERVAL);
    }

    #[test]
    fn test_render_config_formats() {
        let cfg = Config::default();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json] {
            let rendered = render_config(&cfg, format).unwrap();
            assert!(rendered.contains("resync_interval_seconds"));
        }
    }
}
