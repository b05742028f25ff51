//! # Durable Storage
//!
//! Reads and writes the registry as two JSON documents in a data directory:
//!
//! - `towns.json`: town id → `{name, leader, members, claims, description, motd, publicJoin}`
//! - `players.json`: player id → `{townId, rank}`
//!
//! Saves rewrite both documents in full through a temporary file in the same
//! directory that is synced and then renamed over the old file, so a crash
//! leaves either the previous document or the new one.
//!
//! Loads are tolerant. A record that cannot be understood is skipped with a
//! warning and the rest of the document still loads; an unreadable document
//! loads as empty. Null collections from older files read as empty.

use crate::affiliation::{AffiliationTable, PlayerAffiliation};
use crate::error::StorageError;
use crate::registry::{RegistrySnapshot, RestoreReport, TownRegistry};
use crate::town::Town;
use crate::types::{ClaimPos, PlayerId, Rank, TownId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

const TOWNS_FILE: &str = "towns.json";
const PLAYERS_FILE: &str = "players.json";

// ============================================================================
// Document shapes
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TownDocument<'a> {
    name: &'a str,
    leader: PlayerId,
    members: &'a BTreeSet<PlayerId>,
    claims: &'a BTreeSet<ClaimPos>,
    description: &'a str,
    motd: &'a str,
    public_join: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDocument {
    town_id: Option<TownId>,
    rank: Rank,
}

/// A town entry as found on disk. Everything is optional so one bad field
/// doesn't sink the whole document.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct TownRecord {
    name: Option<String>,
    leader: Option<String>,
    #[serde(alias = "citizens")]
    members: Option<Vec<Value>>,
    claims: Option<Vec<Value>>,
    description: Option<String>,
    motd: Option<String>,
    public_join: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PlayerRecord {
    town_id: Option<String>,
    rank: Option<String>,
}

/// Result of reading the data directory.
#[derive(Debug, Default)]
pub struct LoadedState {
    pub snapshot: RegistrySnapshot,
    /// Records dropped because they could not be parsed.
    pub skipped: usize,
}

// ============================================================================
// Storage
// ============================================================================

/// File-backed store for a [`TownRegistry`].
#[derive(Debug, Clone)]
pub struct TownStorage {
    dir: PathBuf,
}

impl TownStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn towns_path(&self) -> PathBuf {
        self.dir.join(TOWNS_FILE)
    }

    pub fn players_path(&self) -> PathBuf {
        self.dir.join(PLAYERS_FILE)
    }

    /// Writes both documents. On failure the files already on disk are left
    /// as they were and the in-memory registry is untouched.
    pub fn save_all(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let towns: BTreeMap<String, TownDocument<'_>> = snapshot
            .towns
            .iter()
            .map(|town| {
                let document = TownDocument {
                    name: town.name(),
                    leader: town.leader(),
                    members: town.members(),
                    claims: town.claims(),
                    description: town.description(),
                    motd: town.motd(),
                    public_join: town.is_public_join(),
                };
                (town.id().to_string(), document)
            })
            .collect();

        let players: BTreeMap<String, PlayerDocument> = snapshot
            .affiliations
            .iter()
            .map(|(player, affiliation)| {
                let document = PlayerDocument {
                    town_id: affiliation.town_id,
                    rank: affiliation.rank,
                };
                (player.to_string(), document)
            })
            .collect();

        self.write_document(&self.towns_path(), &towns)?;
        self.write_document(&self.players_path(), &players)?;

        debug!(
            towns = towns.len(),
            players = players.len(),
            dir = %self.dir.display(),
            "Town data saved"
        );
        Ok(())
    }

    /// Reads both documents, skipping whatever cannot be parsed.
    pub fn load_all(&self) -> LoadedState {
        let mut loaded = LoadedState::default();

        let towns = self.read_document(&self.towns_path());
        for (key, value) in towns {
            match parse_town(&key, value) {
                Some(town) => loaded.snapshot.towns.push(town),
                None => loaded.skipped += 1,
            }
        }

        let players = self.read_document(&self.players_path());
        let mut affiliations = Vec::with_capacity(players.len());
        for (key, value) in players {
            match parse_player(&key, value) {
                Some(entry) => affiliations.push(entry),
                None => loaded.skipped += 1,
            }
        }
        loaded.snapshot.affiliations = affiliations.into_iter().collect::<AffiliationTable>();

        loaded
    }

    fn write_document<T: Serialize>(&self, path: &Path, document: &T) -> Result<(), StorageError> {
        let temp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, document).map_err(|e| StorageError::json(path, e))?;
        writer.flush().map_err(|e| StorageError::io(path, e))?;
        drop(writer);

        temp.as_file().sync_all().map_err(|e| StorageError::io(path, e))?;
        temp.persist(path).map_err(|e| StorageError::io(path, e.error))?;
        Ok(())
    }

    /// Reads a document as an id → record map. Missing files are empty;
    /// unreadable ones are logged and treated as empty.
    fn read_document(&self, path: &Path) -> Map<String, Value> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No saved data found, starting empty");
                return Map::new();
            }
            Err(e) => {
                error!(error = %StorageError::io(path, e), "❌ Failed to read town data, starting empty");
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(_) => {
                error!(path = %path.display(), "❌ Town data is not a JSON object, starting empty");
                Map::new()
            }
            Err(e) => {
                error!(error = %StorageError::json(path, e), "❌ Failed to parse town data, starting empty");
                Map::new()
            }
        }
    }
}

// ============================================================================
// Record parsing
// ============================================================================

fn parse_town(key: &str, value: Value) -> Option<Town> {
    let Ok(id) = key.parse::<TownId>() else {
        warn!(key, "Skipping town with invalid id");
        return None;
    };

    let record: TownRecord = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            warn!(town = %id, error = %e, "Skipping malformed town record");
            return None;
        }
    };

    let Some(name) = record.name.filter(|name| !name.trim().is_empty()) else {
        warn!(town = %id, "Skipping town without a name");
        return None;
    };
    let Some(leader) = record.leader.as_deref().and_then(|raw| raw.parse::<PlayerId>().ok()) else {
        warn!(town = %id, name = %name, "Skipping town with missing or invalid leader");
        return None;
    };

    let mut members = BTreeSet::new();
    for raw in record.members.unwrap_or_default() {
        match raw.as_str().and_then(|s| s.parse::<PlayerId>().ok()) {
            Some(member) => {
                members.insert(member);
            }
            None => warn!(town = %id, member = %raw, "Ignoring invalid member id"),
        }
    }

    let mut claims = BTreeSet::new();
    for raw in record.claims.unwrap_or_default() {
        match serde_json::from_value::<ClaimPos>(raw.clone()) {
            Ok(claim) => {
                claims.insert(claim);
            }
            Err(e) => warn!(town = %id, claim = %raw, error = %e, "Ignoring invalid claim"),
        }
    }

    Some(Town::from_parts(
        id,
        name,
        leader,
        members,
        claims,
        record.description.unwrap_or_default(),
        record.motd.unwrap_or_default(),
        record.public_join.unwrap_or(false),
    ))
}

fn parse_player(key: &str, value: Value) -> Option<(PlayerId, PlayerAffiliation)> {
    let Ok(player) = key.parse::<PlayerId>() else {
        warn!(key, "Skipping player with invalid id");
        return None;
    };

    let record: PlayerRecord = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            warn!(player = %player, error = %e, "Skipping malformed player record");
            return None;
        }
    };

    let town_id = match record.town_id.as_deref() {
        None | Some("") => None,
        Some(raw) => match raw.parse::<TownId>() {
            Ok(town_id) => Some(town_id),
            Err(_) => {
                warn!(player = %player, town = raw, "Skipping player with invalid town id");
                return None;
            }
        },
    };

    let rank = match record.rank.as_deref() {
        None => Rank::Citizen,
        Some(raw) => match serde_json::from_value::<Rank>(Value::String(raw.to_string())) {
            Ok(rank) => rank,
            Err(_) => {
                warn!(player = %player, rank = raw, "Skipping player with unknown rank");
                return None;
            }
        },
    };

    Some((player, PlayerAffiliation { town_id, rank }))
}

// ============================================================================
// Registry helpers
// ============================================================================

/// Snapshots the registry and writes it. The registry lock is only held for
/// the copy.
pub fn save_registry(storage: &TownStorage, registry: &TownRegistry) -> Result<(), StorageError> {
    let snapshot = registry.snapshot();
    storage.save_all(&snapshot)
}

/// Loads the data directory into `registry`, replacing its contents.
pub fn load_into(storage: &TownStorage, registry: &TownRegistry) -> (RestoreReport, usize) {
    let loaded = storage.load_all();
    let report = registry.restore(loaded.snapshot);
    (report, loaded.skipped)
}
