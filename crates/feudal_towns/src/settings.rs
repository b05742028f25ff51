//! Tunable limits consumed by the registry.
//!
//! The registry never caches these values: every operation that depends on a
//! limit loads the current [`TownSettings`] from its [`SettingsHandle`], so a
//! host that swaps in new settings sees them applied on the very next call.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_base_claims() -> usize { 8 }
fn default_claims_per_member() -> usize { 2 }
fn default_max_description_length() -> usize { 200 }
fn default_max_motd_length() -> usize { 200 }
fn default_max_name_length() -> usize { 32 }

/// Claim and metadata limits for towns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownSettings {
    /// Claims every town may hold regardless of size
    #[serde(default = "default_base_claims")]
    pub base_claims: usize,
    /// Additional claims granted per member
    #[serde(default = "default_claims_per_member")]
    pub claims_per_member: usize,
    /// Whether newly created towns accept anyone without an invite
    #[serde(default)]
    pub default_public_join: bool,
    /// Maximum description length in characters
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    /// Maximum message-of-the-day length in characters
    #[serde(default = "default_max_motd_length")]
    pub max_motd_length: usize,
    /// Maximum town name length in characters
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for TownSettings {
    fn default() -> Self {
        Self {
            base_claims: default_base_claims(),
            claims_per_member: default_claims_per_member(),
            default_public_join: false,
            max_description_length: default_max_description_length(),
            max_motd_length: default_max_motd_length(),
            max_name_length: default_max_name_length(),
        }
    }
}

impl TownSettings {
    /// Claim limit for a town with `members` members.
    pub fn claim_limit(&self, members: usize) -> usize {
        self.base_claims
            .saturating_add(members.saturating_mul(self.claims_per_member))
    }

    /// Checks every value against its allowed range.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the settings are usable, or an error string naming the
    /// offending field.
    pub fn validate(&self) -> Result<(), String> {
        check_range("base_claims", self.base_claims, 1, 5000)?;
        check_range("claims_per_member", self.claims_per_member, 0, 5000)?;
        check_range("max_description_length", self.max_description_length, 1, 2000)?;
        check_range("max_motd_length", self.max_motd_length, 1, 2000)?;
        check_range("max_name_length", self.max_name_length, 1, 64)?;
        Ok(())
    }
}

fn check_range(field: &str, value: usize, min: usize, max: usize) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{field} must be between {min} and {max}, got {value}"));
    }
    Ok(())
}

/// Shared, hot-swappable view of the current [`TownSettings`].
///
/// Cloning the handle shares the underlying settings.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Arc<ArcSwap<TownSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: TownSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Returns the settings in effect right now.
    pub fn current(&self) -> Arc<TownSettings> {
        self.inner.load_full()
    }

    /// Replaces the settings; subsequent registry calls observe the new values.
    pub fn store(&self, settings: TownSettings) {
        self.inner.store(Arc::new(settings));
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(TownSettings::default())
    }
}
