//! Pending town invitations.

use crate::types::{PlayerId, TownId};
use std::collections::{HashMap, HashSet};

/// Player → set of towns that have invited that player.
///
/// Players whose invite set becomes empty are pruned, so the map only holds
/// players with at least one outstanding invite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteRegistry {
    invites: HashMap<PlayerId, HashSet<TownId>>,
}

impl InviteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an invite. Inviting the same pair twice is a no-op.
    pub fn invite(&mut self, town: TownId, player: PlayerId) {
        self.invites.entry(player).or_default().insert(town);
    }

    pub fn has_invite(&self, town: TownId, player: PlayerId) -> bool {
        self.invites
            .get(&player)
            .is_some_and(|towns| towns.contains(&town))
    }

    /// Removes an invite, pruning the player's entry once it is empty.
    ///
    /// Returns whether the invite existed.
    pub fn revoke(&mut self, town: TownId, player: PlayerId) -> bool {
        let Some(towns) = self.invites.get_mut(&player) else {
            return false;
        };
        let removed = towns.remove(&town);
        if towns.is_empty() {
            self.invites.remove(&player);
        }
        removed
    }

    /// Removes every invite issued by `town`.
    pub fn clear_for_town(&mut self, town: TownId) {
        self.invites.retain(|_, towns| {
            towns.remove(&town);
            !towns.is_empty()
        });
    }

    /// Towns that currently have an invite out for `player`.
    pub fn invites_for(&self, player: PlayerId) -> Vec<TownId> {
        self.invites
            .get(&player)
            .map(|towns| towns.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn references_town(&self, town: TownId) -> bool {
        self.invites.values().any(|towns| towns.contains(&town))
    }

    /// Number of players with at least one pending invite.
    pub fn player_count(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}
