//! Per-player town membership records.

use crate::types::{PlayerId, Rank, TownId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A player's current town (if any) and rank within it.
///
/// Players the registry has never touched have the default affiliation:
/// no town, [`Rank::Citizen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerAffiliation {
    pub town_id: Option<TownId>,
    pub rank: Rank,
}

impl PlayerAffiliation {
    pub fn member_of(town_id: TownId, rank: Rank) -> Self {
        Self {
            town_id: Some(town_id),
            rank,
        }
    }

    pub fn has_town(&self) -> bool {
        self.town_id.is_some()
    }

    /// Whether this record places the player in `town_id` at exactly `rank`.
    pub fn is(&self, town_id: TownId, rank: Rank) -> bool {
        self.town_id == Some(town_id) && self.rank == rank
    }
}

/// Player → affiliation map with an implicit default for absent players.
///
/// Lookups never insert, so read-only queries for unknown players do not grow
/// the map; an entry is materialised the first time a player's record is
/// written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffiliationTable {
    entries: HashMap<PlayerId, PlayerAffiliation>,
}

impl AffiliationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record, or the default when the player has none.
    pub fn get(&self, player: PlayerId) -> PlayerAffiliation {
        self.entries.get(&player).copied().unwrap_or_default()
    }

    pub fn set(&mut self, player: PlayerId, affiliation: PlayerAffiliation) {
        self.entries.insert(player, affiliation);
    }

    /// Resets the player to unaffiliated/CITIZEN.
    pub fn detach(&mut self, player: PlayerId) {
        self.set(player, PlayerAffiliation::default());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, PlayerAffiliation)> + '_ {
        self.entries.iter().map(|(player, affiliation)| (*player, *affiliation))
    }
}

impl FromIterator<(PlayerId, PlayerAffiliation)> for AffiliationTable {
    fn from_iter<I: IntoIterator<Item = (PlayerId, PlayerAffiliation)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_player_gets_default_without_insert() {
        let table = AffiliationTable::new();
        let affiliation = table.get(PlayerId::new());

        assert!(!affiliation.has_town());
        assert_eq!(affiliation.rank, Rank::Citizen);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_and_detach() {
        let mut table = AffiliationTable::new();
        let player = PlayerId::new();
        let town = TownId::new();

        table.set(player, PlayerAffiliation::member_of(town, Rank::Officer));
        assert!(table.get(player).is(town, Rank::Officer));

        table.detach(player);
        assert_eq!(table.get(player), PlayerAffiliation::default());
        assert_eq!(table.len(), 1);
    }
}
