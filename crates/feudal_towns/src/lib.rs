//! # Feudal Towns
//!
//! The ownership and membership registry behind the Feudal game server's
//! territory system. Players found towns, invite each other in, hand out
//! ranks and claim map chunks for their town.
//!
//! ## Core Features
//!
//! - **Exclusive claims**: a chunk belongs to at most one town
//! - **Single membership**: a player belongs to at most one town at a time
//! - **Rank hierarchy**: leader, officers and citizens with checked transitions
//! - **Invites and open towns**: entry is gated per town
//! - **Crash-safe persistence**: atomic JSON saves and tolerant loads
//! - **Live settings**: claim limits and text caps can change at runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feudal_towns::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TownRegistry::new(SettingsHandle::default()));
//! let service = TownService::new(registry.clone(), TownStorage::new("data/towns"));
//! service.on_start();
//!
//! let leader = PlayerId::new();
//! let town = registry.create_town("Riverside", leader)?;
//! registry.claim_chunk(town.id(), leader, ClaimPos::new("minecraft:overworld", 12, -3))?;
//!
//! service.on_stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Every registry operation is synchronous and short. Share the registry as
//! `Arc<TownRegistry>` across threads or tasks.

pub mod affiliation;
pub mod error;
pub mod invites;
pub mod registry;
pub mod service;
pub mod settings;
pub mod storage;
pub mod town;
pub mod types;

pub use affiliation::{AffiliationTable, PlayerAffiliation};
pub use error::{StorageError, TownError, TownResult};
pub use invites::InviteRegistry;
pub use registry::{LeaveOutcome, RegistrySnapshot, RestoreReport, Roster, TownRegistry, TownSummary};
pub use service::TownService;
pub use settings::{SettingsHandle, TownSettings};
pub use storage::{load_into, save_registry, LoadedState, TownStorage};
pub use town::Town;
pub use types::{ClaimPos, PlayerId, Rank, TownId};
