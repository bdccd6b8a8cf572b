//! CLI arguments and subcommands for herakles-cpulimit.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parses a level name as written in a config file (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Target process selection, shared by the limiter and `tree`.
#[derive(ClapArgs, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct TargetArgs {
    /// Pid of the target process
    #[arg(short = 'p', long)]
    pub pid: Option<u32>,

    /// Executable name or absolute path of the target process
    #[arg(short = 'e', long)]
    pub exe: Option<String>,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-cpulimit",
    about = "Limit the CPU usage of a process and all of its descendants",
    long_about = "Limit the CPU usage of a process and all of its descendants.\n\n\
                  Tracks the target's process family through /proc, estimates each \
                  member's CPU usage and throttles the family with SIGSTOP/SIGCONT \
                  so that its combined usage stays under the requested limit.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Example: herakles-cpulimit --exe ffmpeg --limit 50"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// CPU limit in percent of one CPU (may exceed 100 on multi-core hosts)
    #[arg(short = 'l', long)]
    pub limit: Option<f64>,

    /// Exit when the target dies instead of waiting for a new one
    #[arg(long)]
    pub lazy: bool,

    /// Length of one stop/continue cycle in milliseconds
    #[arg(long)]
    pub time_slot_ms: Option<u64>,

    /// Rescan for new family members every N time slots
    #[arg(long)]
    pub refresh_every: Option<u32>,

    /// procfs mount point
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Log level [default: info, or log_level from the config file]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

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
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate /proc access and configuration
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Show the process family of a target with CPU usage estimates
    Tree {
        #[command(flatten)]
        target: TargetArgs,

        /// Number of samples to take
        #[arg(short = 'n', long, default_value_t = 5)]
        samples: usize,

        /// Interval between samples in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}
