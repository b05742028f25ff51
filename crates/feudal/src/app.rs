//! Main application logic and lifecycle management.
//!
//! The `Application` owns the town service and drives it: load on start,
//! periodic autosave while running, save on shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{wait_for_shutdown, wait_for_shutdown_silent},
};
use feudal_towns::{SettingsHandle, TownRegistry, TownService, TownStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Main application struct.
///
/// Holds the merged configuration and the [`TownService`] whose registry the
/// rest of the game server calls into.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Configuration file path, re-read on reload requests
    config_path: PathBuf,
    /// Registry plus its backing store
    service: TownService,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Build the registry and its storage
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(data_dir) = args.data_dir {
            config.storage.data_dir = data_dir.to_string_lossy().to_string();
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        } else {
            info!("✅ Configuration loaded and validated successfully");
        }

        display_banner();

        let settings = SettingsHandle::new(config.towns.clone());
        let registry = Arc::new(TownRegistry::new(settings));
        let storage = TownStorage::new(&config.storage.data_dir);
        let service = TownService::new(registry, storage);

        Ok(Self {
            config,
            config_path: args.config_path,
            service,
        })
    }

    /// The town service, for embedding hosts that dispatch commands.
    pub fn service(&self) -> &TownService {
        &self.service
    }

    /// Runs until a shutdown signal arrives, then saves and returns.
    ///
    /// A failed final save is returned as an error after being logged.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Feudal Server");
        self.log_configuration_summary();

        self.service().on_start();

        let autosave_handle = self
            .config
            .storage
            .autosave_interval()
            .map(|period| spawn_autosave(self.service.clone(), period));

        let reload_handle = spawn_settings_reload(
            self.config_path.clone(),
            self.service.registry().settings().clone(),
        );

        info!("✅ Feudal Server is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown().await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        if let Some(handle) = autosave_handle {
            handle.abort();
        }
        if let Some(handle) = reload_handle {
            handle.abort();
        }

        info!("💾 Saving town data...");
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || service.on_stop()).await??;

        info!("✅ Feudal Server shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        let towns = &self.config.towns;
        info!("📋 Configuration Summary:");
        info!("  📂 Data directory: {}", self.config.storage.data_dir);
        match self.config.storage.autosave_interval() {
            Some(period) => info!("  💾 Autosave every {}s", period.as_secs()),
            None => info!("  💾 Autosave disabled"),
        }
        info!(
            "  🗺️ Claims: {} base + {} per member",
            towns.base_claims, towns.claims_per_member
        );
        info!("  🚪 New towns public by default: {}", towns.default_public_join);
    }
}

/// Saves the registry every `period` until aborted. The first save happens
/// one full period after start.
pub fn spawn_autosave(service: TownService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;

            let service = service.clone();
            // Failures are logged by the service; the next tick retries.
            if let Err(e) = tokio::task::spawn_blocking(move || service.autosave()).await {
                error!("❌ Autosave task failed: {e}");
            }
        }
    })
}

/// Re-reads the `[towns]` section on SIGHUP and swaps it into the live
/// registry settings.
#[cfg(unix)]
fn spawn_settings_reload(config_path: PathBuf, settings: SettingsHandle) -> Option<JoinHandle<()>> {
    let mut reload = match crate::signals::ReloadSignal::new() {
        Ok(reload) => reload,
        Err(e) => {
            warn!("Settings reload on SIGHUP unavailable: {e}");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while reload.recv().await.is_some() {
            if let Err(e) = reload_town_settings(&config_path, &settings).await {
                warn!("⚠️ Keeping current town settings: {e}");
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_settings_reload(_config_path: PathBuf, _settings: SettingsHandle) -> Option<JoinHandle<()>> {
    None
}

/// Loads the config file and applies its `[towns]` section if it validates.
pub async fn reload_town_settings(config_path: &Path, settings: &SettingsHandle) -> Result<(), String> {
    let config = AppConfig::load_from_file(config_path)
        .await
        .map_err(|e| e.to_string())?;
    config.towns.validate()?;

    settings.store(config.towns);
    info!("🔄 Town settings reloaded from {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feudal_towns::{ClaimPos, PlayerId};
    use tempfile::TempDir;

    fn args_in(dir: &TempDir) -> CliArgs {
        CliArgs {
            config_path: dir.path().join("feudal.toml"),
            data_dir: Some(dir.path().join("data")),
            log_level: Some("debug".to_string()),
            json_logs: false,
        }
    }

    #[tokio::test]
    async fn test_application_creation_applies_overrides() {
        let dir = TempDir::new().unwrap();
        let args = args_in(&dir);

        let app = Application::new(args.clone()).await.unwrap();

        assert!(args.config_path.exists());
        assert_eq!(app.config.logging.level, "debug");
        assert_eq!(app.service().storage().dir(), dir.path().join("data"));
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = args_in(&dir);
        args.log_level = Some("loud".to_string());

        assert!(Application::new(args).await.is_err());
    }

    #[tokio::test]
    async fn test_autosave_writes_documents() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TownRegistry::new(SettingsHandle::default()));
        let service = TownService::new(registry.clone(), TownStorage::new(dir.path()));

        let leader = PlayerId::new();
        let town = registry.create_town("Alpha", leader).unwrap();
        registry
            .claim_chunk(town.id(), leader, ClaimPos::new("overworld", 0, 0))
            .unwrap();

        let handle = spawn_autosave(service.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(service.storage().towns_path().exists());
        assert!(service.storage().players_path().exists());

        let reloaded = TownService::new(
            Arc::new(TownRegistry::new(SettingsHandle::default())),
            TownStorage::new(dir.path()),
        );
        reloaded.on_start();
        assert_eq!(reloaded.registry().town_count(), 1);
    }

    #[tokio::test]
    async fn test_reload_swaps_live_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feudal.toml");
        tokio::fs::write(&path, "[towns]\nbase_claims = 1\nclaims_per_member = 0\n")
            .await
            .unwrap();

        let settings = SettingsHandle::default();
        let registry = TownRegistry::new(settings.clone());
        let leader = PlayerId::new();
        let town = registry.create_town("Alpha", leader).unwrap();
        assert_eq!(registry.claim_limit(town.id()), Ok(10));

        reload_town_settings(&path, &settings).await.unwrap();
        assert_eq!(registry.claim_limit(town.id()), Ok(1));

        tokio::fs::write(&path, "[towns]\nbase_claims = 0\n").await.unwrap();
        assert!(reload_town_settings(&path, &settings).await.is_err());
        assert_eq!(registry.claim_limit(town.id()), Ok(1));
    }
}
