//! # Feudal Server - Main Entry Point
//!
//! Hosts the town registry: parses the command line, loads configuration,
//! sets up logging and runs the application until it is asked to stop.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! feudal
//!
//! # Specify custom configuration and data directory
//! feudal --config production.toml --data-dir /srv/feudal/towns
//!
//! # JSON logging for production
//! feudal --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `feudal.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! - SIGINT (Ctrl+C) / SIGTERM: save and shut down
//! - SIGHUP (Unix): reload the `[towns]` section of the configuration file

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the server.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or the final save
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let mut logging_config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_config.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging_config, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{LoggingSettings, StorageSettings};
