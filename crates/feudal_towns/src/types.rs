//! # Core Type Definitions
//!
//! Identifier and value types shared by every part of the town registry.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Unique identifier for a player known to the host
//! - [`TownId`] - Unique identifier for a town
//! - [`ClaimPos`] - A claimable map region (realm plus chunk coordinates)
//! - [`Rank`] - A player's role inside their town
//!
//! The identifier types are thin wrappers around UUIDs so a town id can never
//! be passed where a player id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a player.
///
/// # Examples
///
/// ```rust
/// use feudal_towns::PlayerId;
///
/// let player_id = PlayerId::new();
/// let parsed: PlayerId = player_id.to_string().parse()?;
/// assert_eq!(player_id, parsed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a town.
///
/// Allocated by the registry when a town is created and stable for the
/// lifetime of the town, including across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TownId(pub Uuid);

impl TownId {
    /// Creates a new random town ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TownId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for TownId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Claims
// ============================================================================

/// A claimable region: a realm (dimension) identifier plus chunk coordinates.
///
/// Equality and hashing cover all three fields, so the same coordinates in two
/// realms are distinct claims.
///
/// ```rust
/// use feudal_towns::ClaimPos;
///
/// let spawn = ClaimPos::new("minecraft:overworld", 0, 0);
/// assert_ne!(spawn, ClaimPos::new("minecraft:the_nether", 0, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimPos {
    /// Realm identifier, e.g. `minecraft:overworld`
    #[serde(alias = "dimension")]
    pub realm: String,
    /// Chunk X coordinate
    #[serde(alias = "chunkX")]
    pub x: i32,
    /// Chunk Z coordinate
    #[serde(alias = "chunkZ")]
    pub z: i32,
}

impl ClaimPos {
    pub fn new(realm: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            realm: realm.into(),
            x,
            z,
        }
    }
}

impl fmt::Display for ClaimPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.realm, self.x, self.z)
    }
}

// ============================================================================
// Ranks
// ============================================================================

/// A player's role within their town, ordered by privilege.
///
/// `Rank::Leader > Rank::Officer > Rank::Citizen`. Serialized as the
/// upper-case names used by the players document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rank {
    Leader,
    Officer,
    #[default]
    Citizen,
}

impl Rank {
    /// Whether this rank may claim and unclaim chunks for the town.
    pub fn can_manage_claims(self) -> bool {
        matches!(self, Rank::Leader | Rank::Officer)
    }

    pub fn is_leader(self) -> bool {
        self == Rank::Leader
    }

    fn privilege(self) -> u8 {
        match self {
            Rank::Leader => 2,
            Rank::Officer => 1,
            Rank::Citizen => 0,
        }
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.privilege().cmp(&other.privilege())
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rank::Leader => "LEADER",
            Rank::Officer => "OFFICER",
            Rank::Citizen => "CITIZEN",
        };
        f.write_str(name)
    }
}
