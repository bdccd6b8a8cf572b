//! herakles-cpulimit - version 0.1.0
//!
//! Limits the CPU usage of a process family with tracing logging.
//! This is the main entry point that runs the limiter and handles subcommands.

mod cli;
mod commands;
mod config;
mod limiter;
mod startup_checks;

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_tree};
use config::{resolve_config, show_config, validate_effective_config, Config};
use limiter::{LimiterSettings, Target};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level();
    let log_level = match level {
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

    info!("Logging initialized with level: {:?}", level);
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

/// Sets `stop` on SIGINT or SIGTERM.
async fn shutdown_signal(stop: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
            info!("Received SIGINT (Ctrl+C), resuming processes and shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, resuming processes and shutting down...");
        }
    }
    stop.store(true, Ordering::Relaxed);
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
        if let Commands::CheckRequirements = command {
            let config = resolve_config(&args)?;
            setup_logging(&config);
            println!("🔍 Checking Runtime Requirements");
            println!("================================\n");

            match startup_checks::validate_requirements(&config.proc_root()) {
                Ok(_) => {
                    println!("\n✅ All requirements met - ready to limit!");
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("\n❌ Requirements check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        let config = load_validated_config(&args)?;

        return match command {
            Commands::Check => command_check(&config),

            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Tree {
                target,
                samples,
                interval_ms,
            } => command_tree(target, *samples, *interval_ms, &config),

            Commands::CheckRequirements => unreachable!("CheckRequirements handled above"),
        };
    }

    // Limiter mode
    let config = load_validated_config(&args)?;
    setup_logging(&config);

    let Some(target) = Target::from_args(&args.target) else {
        eprintln!("❌ No target given, use --pid or --exe");
        std::process::exit(1);
    };
    let settings = LimiterSettings::from_config(&config)?;

    if let Err(e) = startup_checks::validate_requirements(&settings.proc_root) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The limiter will start but may miss processes!");
    }

    info!("Starting herakles-cpulimit");

    let stop = Arc::new(AtomicBool::new(false));
    tokio::spawn(shutdown_signal(stop.clone()));

    if let Err(e) = limiter::run(&settings, &target, stop).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("herakles-cpulimit stopped");
    Ok(())
}
