//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-cpulimit.yaml"));

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles CPU Limiter Configuration
# ==================================
#
# Limiting
# --------
# limit_percent: 50            # CPU limit in percent of one CPU (up to 100 x CPUs)
# lazy: false                  # Exit when the target dies instead of waiting
#
# Timing
# ------
# time_slot_ms: 100            # Length of one stop/continue cycle
# refresh_every: 10            # Rescan for new children every N slots
#
# System
# ------
# proc_root: "/proc"           # procfs mount point
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace (--log-level wins)
"#;

    format!("{comments}\n{yaml}")
}
