//! Configuration management for herakles-cpulimit.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_cpulimit::process::{CPU_COUNT, DEFAULT_PROC_ROOT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_TIME_SLOT_MS: u64 = 100;
pub const DEFAULT_REFRESH_EVERY: u32 = 10;

/// Default config file locations, first existing one wins.
const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/cpulimit.yaml",
    "/etc/herakles/cpulimit.yml",
    "/etc/herakles/cpulimit.json",
    "./herakles-cpulimit.yaml",
    "./herakles-cpulimit.yml",
    "./herakles-cpulimit.json",
];

/// Limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// CPU limit in percent of one CPU
    #[serde(alias = "limit-percent", alias = "limit")]
    pub limit_percent: Option<f64>,

    /// Length of one stop/continue cycle
    #[serde(alias = "time-slot-ms")]
    pub time_slot_ms: Option<u64>,

    /// Rescan for new family members every N slots
    #[serde(alias = "refresh-every")]
    pub refresh_every: Option<u32>,

    /// Exit when the target dies
    pub lazy: Option<bool>,

    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limit_percent: None,
            time_slot_ms: Some(DEFAULT_TIME_SLOT_MS),
            refresh_every: Some(DEFAULT_REFRESH_EVERY),
            lazy: Some(false),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    /// Limit as a fraction of one CPU, if set.
    pub fn limit_fraction(&self) -> Option<f64> {
        self.limit_percent.map(|p| p / 100.0)
    }

    /// Effective log level; unknown names are rejected by validation.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    validate_with_cpus(cfg, *CPU_COUNT)
}

fn validate_with_cpus(cfg: &Config, cpus: usize) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(limit) = cfg.limit_percent {
        let max = 100.0 * cpus as f64;
        if !limit.is_finite() || limit <= 0.0 || limit > max {
            return Err(format!(
                "limit_percent {} out of range, expected a value in (0, {}]",
                limit, max
            )
            .into());
        }
    }

    if cfg.time_slot_ms == Some(0) {
        return Err("time_slot_ms must be greater than 0".into());
    }

    if cfg.refresh_every == Some(0) {
        return Err("refresh_every must be greater than 0".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::parse(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            )
            .into());
        }
    }

    if let Some(root) = cfg.proc_root.as_deref() {
        if root.as_os_str().is_empty() {
            return Err("proc_root must not be empty".into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if args.limit.is_some() {
        config.limit_percent = args.limit;
    }
    if let Some(slot) = args.time_slot_ms {
        config.time_slot_ms = Some(slot);
    }
    if let Some(n) = args.refresh_every {
        config.refresh_every = Some(n);
    }
    if args.lazy {
        config.lazy = Some(true);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config content, picking the format from the file extension.
fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn with_limit(limit: f64) -> Config {
        Config {
            limit_percent: Some(limit),
            ..Config::default()
        }
    }

    // -------------------------------------------------------------------------
    // Tests for validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_with_cpus(&Config::default(), 1).is_ok());
    }

    #[test]
    fn test_limit_bounds_scale_with_cpu_count() {
        assert!(validate_with_cpus(&with_limit(100.0), 1).is_ok());
        assert!(validate_with_cpus(&with_limit(100.5), 1).is_err());
        assert!(validate_with_cpus(&with_limit(350.0), 4).is_ok());
        assert!(validate_with_cpus(&with_limit(0.0), 4).is_err());
        assert!(validate_with_cpus(&with_limit(-5.0), 4).is_err());
        assert!(validate_with_cpus(&with_limit(f64::NAN), 4).is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let cfg = Config {
            time_slot_ms: Some(0),
            ..Config::default()
        };
        assert!(validate_with_cpus(&cfg, 1).is_err());

        let cfg = Config {
            refresh_every: Some(0),
            ..Config::default()
        };
        assert!(validate_with_cpus(&cfg, 1).is_err());
    }

    // -------------------------------------------------------------------------
    // Tests for loading and precedence
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_config_by_extension() {
        let yaml = parse_config("limit_percent: 25\nlazy: true\n", Path::new("a.yaml")).unwrap();
        assert_eq!(yaml.limit_percent, Some(25.0));
        assert_eq!(yaml.lazy, Some(true));

        let json = parse_config(r#"{"time_slot_ms": 50}"#, Path::new("a.json")).unwrap();
        assert_eq!(json.time_slot_ms, Some(50));
        assert_eq!(json.limit_percent, None);

        let toml = parse_config("refresh_every = 3\n", Path::new("a.toml")).unwrap();
        assert_eq!(toml.refresh_every, Some(3));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "limit_percent: 25\ntime_slot_ms: 200").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from(["herakles-cpulimit", "-c", &path, "-l", "40", "-p", "1"]);
        let cfg = resolve_config(&args).unwrap();

        assert_eq!(cfg.limit_percent, Some(40.0));
        assert_eq!(cfg.time_slot_ms, Some(200));
        assert!((cfg.limit_fraction().unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let args = Args::parse_from(["herakles-cpulimit", "--no-config", "-p", "1"]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.time_slot_ms, Some(DEFAULT_TIME_SLOT_MS));
        assert_eq!(cfg.refresh_every, Some(DEFAULT_REFRESH_EVERY));
        assert_eq!(cfg.proc_root(), PathBuf::from("/proc"));
    }

    #[test]
    fn test_log_level_from_file_unless_given_on_cli() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "log_level: debug").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from(["herakles-cpulimit", "-c", &path, "-p", "1"]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.log_level(), LogLevel::Debug);

        let args = Args::parse_from(["herakles-cpulimit", "-c", &path, "--log-level", "warn"]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let cfg = Config {
            log_level: Some("chatty".into()),
            ..Config::default()
        };
        assert!(validate_with_cpus(&cfg, 1).is_err());
        assert_eq!(cfg.log_level(), LogLevel::Info);
    }
}
