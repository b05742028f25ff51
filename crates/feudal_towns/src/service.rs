//! Lifecycle hooks for the host.
//!
//! The host decides *when* these run; [`TownService`] only knows what to do
//! on start, on stop and on each autosave tick.

use crate::error::StorageError;
use crate::registry::TownRegistry;
use crate::storage::{load_into, save_registry, TownStorage};
use std::sync::Arc;
use tracing::{error, info};

/// Ties a shared [`TownRegistry`] to its [`TownStorage`].
#[derive(Debug, Clone)]
pub struct TownService {
    registry: Arc<TownRegistry>,
    storage: TownStorage,
}

impl TownService {
    pub fn new(registry: Arc<TownRegistry>, storage: TownStorage) -> Self {
        Self { registry, storage }
    }

    /// The registry command handlers should call into.
    pub fn registry(&self) -> &Arc<TownRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &TownStorage {
        &self.storage
    }

    /// Loads saved data into the registry. Never fails: anything unreadable
    /// has already been logged and skipped.
    pub fn on_start(&self) {
        let (report, skipped) = load_into(&self.storage, &self.registry);
        info!(
            towns = report.towns,
            players = report.affiliations,
            skipped,
            repaired = report.repairs,
            dir = %self.storage.dir().display(),
            "🏘️ Town data loaded"
        );
    }

    /// Saves on shutdown.
    pub fn on_stop(&self) -> Result<(), StorageError> {
        self.save("shutdown")
    }

    /// Periodic save. A failure leaves the registry untouched; the next tick
    /// tries again.
    pub fn autosave(&self) -> Result<(), StorageError> {
        self.save("autosave")
    }

    fn save(&self, reason: &'static str) -> Result<(), StorageError> {
        match save_registry(&self.storage, &self.registry) {
            Ok(()) => {
                info!(reason, towns = self.registry.town_count(), "💾 Town data saved");
                Ok(())
            }
            Err(e) => {
                error!(reason, error = %e, "❌ Failed to save town data");
                Err(e)
            }
        }
    }
}
