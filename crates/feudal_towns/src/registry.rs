//! # Town Registry
//!
//! The single authority over towns, player affiliations, claims and invites.
//!
//! ## Consistency
//!
//! All state lives in one [`RegistryState`] behind one `RwLock`. The
//! invariants span several maps at once (a claim lives in a town *and* in the
//! claim index; a membership lives in a town roster *and* in the affiliation
//! table), so every mutation holds the write guard for its whole
//! validate-then-commit step. Every check that can reject a request runs
//! before the first write, so an `Err` always means "nothing changed".
//!
//! Queries take the read guard and hand back owned clones; no guard ever
//! leaves this module.
//!
//! ## Invariants
//!
//! - every town's leader is in its member set
//! - town names are unique, compared case-insensitively
//! - a [`ClaimPos`] belongs to at most one town
//! - a player is a member of at most one town, and the affiliation table
//!   agrees with the rosters

use crate::affiliation::{AffiliationTable, PlayerAffiliation};
use crate::error::{TownError, TownResult};
use crate::invites::InviteRegistry;
use crate::settings::SettingsHandle;
use crate::town::Town;
use crate::types::{ClaimPos, PlayerId, Rank, TownId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What happened to a player who left their town.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player left; the town continues without them.
    Left,
    /// The player was the last member, so the town was disbanded.
    Disbanded,
    /// The player's town no longer existed; their record was reset.
    Detached,
}

/// Members of a town grouped by rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub leader: PlayerId,
    pub officers: Vec<PlayerId>,
    pub citizens: Vec<PlayerId>,
}

/// Read-only overview of a town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownSummary {
    pub id: TownId,
    pub name: String,
    pub leader: PlayerId,
    pub member_count: usize,
    pub claim_count: usize,
    pub claim_limit: usize,
    pub public_join: bool,
    pub description: String,
    pub motd: String,
}

/// Point-in-time copy of everything that is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub towns: Vec<Town>,
    pub affiliations: AffiliationTable,
}

/// Counts produced when a snapshot is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub towns: usize,
    pub affiliations: usize,
    pub repairs: usize,
}

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    towns: HashMap<TownId, Town>,
    /// Lower-cased name → id
    names: HashMap<String, TownId>,
    /// Reverse claim index
    claims: HashMap<ClaimPos, TownId>,
    affiliations: AffiliationTable,
    invites: InviteRegistry,
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl RegistryState {
    fn town(&self, id: TownId) -> TownResult<&Town> {
        self.towns.get(&id).ok_or(TownError::NotFound)
    }

    fn town_mut(&mut self, id: TownId) -> TownResult<&mut Town> {
        self.towns.get_mut(&id).ok_or(TownError::NotFound)
    }

    fn require_leader(&self, town_id: TownId, requester: PlayerId) -> TownResult<&Town> {
        let town = self.town(town_id)?;
        if town.leader() != requester || !self.affiliations.get(requester).is(town_id, Rank::Leader) {
            return Err(TownError::NotLeader);
        }
        Ok(town)
    }

    fn insert_town(&mut self, town: Town) {
        let id = town.id();
        self.names.insert(name_key(town.name()), id);
        for claim in town.claims() {
            self.claims.insert(claim.clone(), id);
        }
        self.towns.insert(id, town);
    }

    /// Removes a town from every index, detaching its members and dropping
    /// its claims and invites.
    fn remove_town(&mut self, id: TownId) -> Option<Town> {
        let mut town = self.towns.remove(&id)?;
        self.names.remove(&name_key(town.name()));
        for claim in town.drain_claims() {
            self.claims.remove(&claim);
        }
        for member in town.drain_members() {
            self.affiliations.detach(member);
        }
        self.invites.clear_for_town(id);
        Some(town)
    }

    fn add_citizen(&mut self, town_id: TownId, player: PlayerId) -> TownResult<()> {
        self.town_mut(town_id)?.add_member(player);
        self.invites.revoke(town_id, player);
        self.affiliations
            .set(player, PlayerAffiliation::member_of(town_id, Rank::Citizen));
        Ok(())
    }

    /// Builds a consistent state from possibly inconsistent persisted data.
    ///
    /// Towns are visited in id order; on any conflict the earlier town wins.
    fn rebuild(mut towns: Vec<Town>, recorded: AffiliationTable) -> (Self, usize) {
        towns.sort_by_key(Town::id);

        let mut state = RegistryState::default();
        let mut member_of: HashMap<PlayerId, TownId> = HashMap::new();
        let mut repairs = 0;

        for mut town in towns {
            let id = town.id();

            if town.name().trim().is_empty() {
                warn!(town = %id, "Saved town has no name - skipping");
                repairs += 1;
                continue;
            }
            if state.towns.contains_key(&id) {
                warn!(town = %id, "Duplicate town id in saved data - skipping");
                repairs += 1;
                continue;
            }
            if state.names.contains_key(&name_key(town.name())) {
                warn!(town = %id, name = town.name(), "Town name already in use by another saved town - skipping");
                repairs += 1;
                continue;
            }
            if let Some(other) = member_of.get(&town.leader()) {
                warn!(town = %id, leader = %town.leader(), other = %other, "Town leader already belongs to another saved town - skipping");
                repairs += 1;
                continue;
            }

            let contested: Vec<PlayerId> = town
                .members()
                .iter()
                .filter(|member| member_of.contains_key(*member))
                .copied()
                .collect();
            for member in contested {
                warn!(town = %id, player = %member, "Player listed in more than one town - keeping the first");
                town.remove_member(member);
                repairs += 1;
            }

            let overlapping: Vec<ClaimPos> = town
                .claims()
                .iter()
                .filter(|claim| state.claims.contains_key(*claim))
                .cloned()
                .collect();
            for claim in overlapping {
                warn!(town = %id, claim = %claim, "Chunk claimed by more than one town - keeping the first");
                town.remove_claim(&claim);
                repairs += 1;
            }

            for member in town.members() {
                member_of.insert(*member, id);
            }
            state.insert_town(town);
        }

        for (player, affiliation) in recorded.iter() {
            let consistent = match affiliation.town_id {
                Some(town_id) => member_of.get(&player) == Some(&town_id),
                None => affiliation.rank == Rank::Citizen,
            };
            if consistent {
                state.affiliations.set(player, affiliation);
            } else {
                if !member_of.contains_key(&player) {
                    warn!(player = %player, "Player record does not match any town roster - detaching");
                }
                state.affiliations.detach(player);
                repairs += 1;
            }
        }

        for town in state.towns.values() {
            for member in town.members() {
                let recorded_rank = recorded.get(*member);
                let rank = if *member == town.leader() {
                    Rank::Leader
                } else if recorded_rank.is(town.id(), Rank::Officer) {
                    Rank::Officer
                } else {
                    Rank::Citizen
                };
                let expected = PlayerAffiliation::member_of(town.id(), rank);
                if recorded_rank != expected {
                    debug!(player = %member, town = %town.id(), rank = %rank, "Repairing player record from town roster");
                    repairs += 1;
                }
                state.affiliations.set(*member, expected);
            }
        }

        (state, repairs)
    }
}

/// Authoritative registry of towns, affiliations, claims and invites.
///
/// Construct one per process (or per test) and share it as
/// `Arc<TownRegistry>`; every method takes `&self`.
///
/// # Examples
///
/// ```rust
/// use feudal_towns::{ClaimPos, PlayerId, Rank, SettingsHandle, TownRegistry};
///
/// let registry = TownRegistry::new(SettingsHandle::default());
/// let leader = PlayerId::new();
///
/// let town = registry.create_town("Alpha", leader)?;
/// registry.claim_chunk(town.id(), leader, ClaimPos::new("overworld", 0, 0))?;
///
/// assert_eq!(registry.affiliation(leader).rank, Rank::Leader);
/// assert!(registry.is_claimed(&ClaimPos::new("overworld", 0, 0)));
/// # Ok::<(), feudal_towns::TownError>(())
/// ```
#[derive(Debug)]
pub struct TownRegistry {
    state: RwLock<RegistryState>,
    settings: SettingsHandle,
}

impl TownRegistry {
    /// Creates an empty registry reading its limits from `settings`.
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    // ========================================================================
    // Town lifecycle
    // ========================================================================

    /// Founds a new town led by `leader`.
    ///
    /// Fails with [`TownError::InvalidName`] for blank, multi-word or
    /// over-long names, [`TownError::AlreadyAffiliated`] if the leader is
    /// already in a town, and [`TownError::NameTaken`] if the name is in use
    /// (ignoring case).
    pub fn create_town(&self, name: &str, leader: PlayerId) -> TownResult<Town> {
        let settings = self.settings.current();
        let max = settings.max_name_length;
        if name.is_empty() || name.chars().count() > max || name.chars().any(char::is_whitespace) {
            return Err(TownError::InvalidName { max });
        }

        let mut state = self.state.write();
        if state.affiliations.get(leader).has_town() {
            return Err(TownError::AlreadyAffiliated);
        }
        if state.names.contains_key(&name_key(name)) {
            return Err(TownError::NameTaken);
        }

        let mut id = TownId::new();
        while state.towns.contains_key(&id) {
            id = TownId::new();
        }

        let town = Town::new(id, name, leader, settings.default_public_join);
        state.insert_town(town.clone());
        state
            .affiliations
            .set(leader, PlayerAffiliation::member_of(id, Rank::Leader));

        info!(town = %id, name, leader = %leader, "🏰 Town created");
        Ok(town)
    }

    /// Dissolves a town. Only its leader may do this.
    ///
    /// Every member is detached, every claim released and every invite the
    /// town issued is dropped.
    pub fn disband_town(&self, town_id: TownId, requester: PlayerId) -> TownResult<()> {
        let mut state = self.state.write();
        state.require_leader(town_id, requester)?;

        if let Some(town) = state.remove_town(town_id) {
            info!(town = %town_id, name = town.name(), "🏚️ Town disbanded");
        }
        Ok(())
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Joins a town that is public or has invited the player.
    pub fn join_town(&self, town_id: TownId, player: PlayerId) -> TownResult<()> {
        let mut state = self.state.write();
        let town = state.town(town_id)?;
        if state.affiliations.get(player).has_town() {
            return Err(TownError::AlreadyAffiliated);
        }
        if !town.is_public_join() && !state.invites.has_invite(town_id, player) {
            return Err(TownError::NotInvited);
        }

        state.add_citizen(town_id, player)?;
        info!(town = %town_id, player = %player, "Player joined town");
        Ok(())
    }

    /// Leaves the player's current town.
    ///
    /// A leader with other members must transfer leadership first. A leader
    /// who is the last member disbands the town by leaving.
    pub fn leave_town(&self, player: PlayerId) -> TownResult<LeaveOutcome> {
        let mut state = self.state.write();
        let affiliation = state.affiliations.get(player);
        let Some(town_id) = affiliation.town_id else {
            return Err(TownError::NotAffiliated);
        };

        if !state.towns.contains_key(&town_id) {
            state.affiliations.detach(player);
            warn!(player = %player, town = %town_id, "Player belonged to a missing town - detached");
            return Ok(LeaveOutcome::Detached);
        }

        let town = state.town(town_id)?;

        if town.leader() == player {
            if town.member_count() > 1 {
                return Err(TownError::SoleLeaderMustTransfer);
            }
            state.remove_town(town_id);
            info!(town = %town_id, player = %player, "Last member left - town disbanded");
            return Ok(LeaveOutcome::Disbanded);
        }

        state.town_mut(town_id)?.remove_member(player);
        state.affiliations.detach(player);
        info!(town = %town_id, player = %player, "Player left town");
        Ok(LeaveOutcome::Left)
    }

    /// Changes a member's rank. Only the leader may do this.
    ///
    /// - `Officer`: promotes a citizen
    /// - `Citizen`: demotes an officer
    /// - `Leader`: transfers leadership to another member; the old leader
    ///   becomes a citizen
    ///
    /// Any other transition is [`TownError::InvalidTransition`].
    pub fn set_rank(
        &self,
        town_id: TownId,
        requester: PlayerId,
        target: PlayerId,
        new_rank: Rank,
    ) -> TownResult<()> {
        let mut state = self.state.write();
        let town = state.require_leader(town_id, requester)?;
        if !town.is_member(target) {
            return Err(TownError::NotMember);
        }

        let current = state.affiliations.get(target).rank;
        match new_rank {
            Rank::Leader => {
                if target == requester {
                    return Err(TownError::InvalidTransition);
                }
                state.town_mut(town_id)?.set_leader(target);
                state
                    .affiliations
                    .set(requester, PlayerAffiliation::member_of(town_id, Rank::Citizen));
                state
                    .affiliations
                    .set(target, PlayerAffiliation::member_of(town_id, Rank::Leader));
                info!(town = %town_id, from = %requester, to = %target, "👑 Leadership transferred");
            }
            Rank::Officer | Rank::Citizen => {
                let allowed = matches!(
                    (current, new_rank),
                    (Rank::Citizen, Rank::Officer) | (Rank::Officer, Rank::Citizen)
                );
                if !allowed {
                    return Err(TownError::InvalidTransition);
                }
                state
                    .affiliations
                    .set(target, PlayerAffiliation::member_of(town_id, new_rank));
                info!(town = %town_id, player = %target, from = %current, to = %new_rank, "Rank changed");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Invites
    // ========================================================================

    /// Invites `target` to the town. Only the leader may invite; inviting
    /// twice is harmless.
    pub fn invite(&self, town_id: TownId, requester: PlayerId, target: PlayerId) -> TownResult<()> {
        let mut state = self.state.write();
        let town = state.require_leader(town_id, requester)?;
        if town.is_member(target) {
            return Err(TownError::AlreadyMember);
        }

        state.invites.invite(town_id, target);
        debug!(town = %town_id, player = %target, "Invite issued");
        Ok(())
    }

    /// Withdraws an outstanding invite. Only the leader may revoke.
    pub fn revoke_invite(&self, town_id: TownId, requester: PlayerId, target: PlayerId) -> TownResult<()> {
        let mut state = self.state.write();
        state.require_leader(town_id, requester)?;
        if !state.invites.has_invite(town_id, target) {
            return Err(TownError::NoSuchInvite);
        }

        state.invites.revoke(town_id, target);
        Ok(())
    }

    /// Accepts or declines an invite.
    ///
    /// Accepting has the same effect as joining through the invite. An invite
    /// from a town that no longer exists is discarded and reported as
    /// [`TownError::NoSuchInvite`].
    pub fn respond_to_invite(&self, town_id: TownId, player: PlayerId, accept: bool) -> TownResult<()> {
        let mut state = self.state.write();
        if !state.invites.has_invite(town_id, player) {
            return Err(TownError::NoSuchInvite);
        }
        if !state.towns.contains_key(&town_id) {
            state.invites.revoke(town_id, player);
            return Err(TownError::NoSuchInvite);
        }

        if !accept {
            state.invites.revoke(town_id, player);
            debug!(town = %town_id, player = %player, "Invite declined");
            return Ok(());
        }

        if state.affiliations.get(player).has_town() {
            return Err(TownError::AlreadyAffiliated);
        }
        state.add_citizen(town_id, player)?;
        info!(town = %town_id, player = %player, "Player accepted invite");
        Ok(())
    }

    /// Live towns with an outstanding invite for `player`. Invites left
    /// behind by vanished towns are pruned along the way.
    pub fn pending_invites(&self, player: PlayerId) -> Vec<TownId> {
        let mut state = self.state.write();
        let (mut live, stale): (Vec<TownId>, Vec<TownId>) = state
            .invites
            .invites_for(player)
            .into_iter()
            .partition(|town| state.towns.contains_key(town));
        for town in stale {
            state.invites.revoke(town, player);
        }
        live.sort();
        live
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Claims `pos` for the town.
    ///
    /// The requester must be a leader or officer of that town. A chunk that
    /// is already owned, even by this same town, is rejected.
    pub fn claim_chunk(&self, town_id: TownId, requester: PlayerId, pos: ClaimPos) -> TownResult<()> {
        let settings = self.settings.current();
        let mut state = self.state.write();
        let town = state.town(town_id)?;

        let affiliation = state.affiliations.get(requester);
        if affiliation.town_id != Some(town_id) || !affiliation.rank.can_manage_claims() {
            return Err(TownError::Forbidden);
        }
        if state.claims.contains_key(&pos) {
            return Err(TownError::AlreadyClaimed);
        }
        let limit = settings.claim_limit(town.member_count());
        let current = town.claim_count();
        if current >= limit {
            return Err(TownError::LimitReached { current, limit });
        }

        state.town_mut(town_id)?.add_claim(pos.clone());
        state.claims.insert(pos.clone(), town_id);
        info!(town = %town_id, claim = %pos, "Chunk claimed");
        Ok(())
    }

    /// Releases one of the town's claims.
    pub fn unclaim_chunk(&self, town_id: TownId, requester: PlayerId, pos: &ClaimPos) -> TownResult<()> {
        let mut state = self.state.write();
        let town = state.town(town_id)?;

        let affiliation = state.affiliations.get(requester);
        if affiliation.town_id != Some(town_id) || !affiliation.rank.can_manage_claims() {
            return Err(TownError::Forbidden);
        }
        if !town.owns_claim(pos) {
            return Err(TownError::NotClaimed);
        }

        state.town_mut(town_id)?.remove_claim(pos);
        state.claims.remove(pos);
        info!(town = %town_id, claim = %pos, "Chunk unclaimed");
        Ok(())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn set_description(&self, town_id: TownId, requester: PlayerId, description: &str) -> TownResult<()> {
        let max = self.settings.current().max_description_length;
        let mut state = self.state.write();
        state.require_leader(town_id, requester)?;
        if description.chars().count() > max {
            return Err(TownError::DescriptionTooLong { max });
        }

        state.town_mut(town_id)?.set_description(description);
        Ok(())
    }

    pub fn set_motd(&self, town_id: TownId, requester: PlayerId, motd: &str) -> TownResult<()> {
        let max = self.settings.current().max_motd_length;
        let mut state = self.state.write();
        state.require_leader(town_id, requester)?;
        if motd.chars().count() > max {
            return Err(TownError::MotdTooLong { max });
        }

        state.town_mut(town_id)?.set_motd(motd);
        Ok(())
    }

    /// Opens the town to anyone (`true`) or restricts it to invitees.
    pub fn set_public_join(&self, town_id: TownId, requester: PlayerId, public_join: bool) -> TownResult<()> {
        let mut state = self.state.write();
        state.require_leader(town_id, requester)?;

        state.town_mut(town_id)?.set_public_join(public_join);
        info!(town = %town_id, public_join, "Join policy changed");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn town(&self, town_id: TownId) -> Option<Town> {
        self.state.read().towns.get(&town_id).cloned()
    }

    /// Looks a town up by name, ignoring case.
    pub fn town_by_name(&self, name: &str) -> Option<Town> {
        let state = self.state.read();
        let id = state.names.get(&name_key(name))?;
        state.towns.get(id).cloned()
    }

    pub fn town_of_player(&self, player: PlayerId) -> Option<Town> {
        let state = self.state.read();
        let town_id = state.affiliations.get(player).town_id?;
        state.towns.get(&town_id).cloned()
    }

    /// The town owning `pos`, via the claim index.
    pub fn town_at(&self, pos: &ClaimPos) -> Option<Town> {
        let state = self.state.read();
        let town_id = state.claims.get(pos)?;
        state.towns.get(town_id).cloned()
    }

    pub fn is_claimed(&self, pos: &ClaimPos) -> bool {
        self.state.read().claims.contains_key(pos)
    }

    /// The player's affiliation, or the default for players never seen.
    pub fn affiliation(&self, player: PlayerId) -> PlayerAffiliation {
        self.state.read().affiliations.get(player)
    }

    /// Current claim limit for the town under the live settings.
    pub fn claim_limit(&self, town_id: TownId) -> TownResult<usize> {
        let settings = self.settings.current();
        let state = self.state.read();
        Ok(settings.claim_limit(state.town(town_id)?.member_count()))
    }

    pub fn claims_of(&self, town_id: TownId) -> TownResult<Vec<ClaimPos>> {
        let state = self.state.read();
        Ok(state.town(town_id)?.claims().iter().cloned().collect())
    }

    /// Members grouped by rank.
    pub fn roster(&self, town_id: TownId) -> TownResult<Roster> {
        let state = self.state.read();
        let town = state.town(town_id)?;

        let mut roster = Roster {
            leader: town.leader(),
            officers: Vec::new(),
            citizens: Vec::new(),
        };
        for member in town.members() {
            if *member == town.leader() {
                continue;
            }
            match state.affiliations.get(*member).rank {
                Rank::Officer => roster.officers.push(*member),
                _ => roster.citizens.push(*member),
            }
        }
        Ok(roster)
    }

    pub fn summary(&self, town_id: TownId) -> TownResult<TownSummary> {
        let settings = self.settings.current();
        let state = self.state.read();
        let town = state.town(town_id)?;

        Ok(TownSummary {
            id: town.id(),
            name: town.name().to_string(),
            leader: town.leader(),
            member_count: town.member_count(),
            claim_count: town.claim_count(),
            claim_limit: settings.claim_limit(town.member_count()),
            public_join: town.is_public_join(),
            description: town.description().to_string(),
            motd: town.motd().to_string(),
        })
    }

    /// All towns, sorted by name.
    pub fn towns(&self) -> Vec<Town> {
        let state = self.state.read();
        let mut towns: Vec<Town> = state.towns.values().cloned().collect();
        towns.sort_by_key(|town| name_key(town.name()));
        towns
    }

    pub fn town_count(&self) -> usize {
        self.state.read().towns.len()
    }

    // ========================================================================
    // Persistence support
    // ========================================================================

    /// Copies the persisted portion of the registry.
    ///
    /// The lock is held only while cloning; serialization and disk IO happen
    /// on the copy.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        let mut towns: Vec<Town> = state.towns.values().cloned().collect();
        towns.sort_by_key(Town::id);
        RegistrySnapshot {
            towns,
            affiliations: state.affiliations.clone(),
        }
    }

    /// Replaces the whole registry with `snapshot`, repairing any
    /// inconsistency so the invariants hold afterwards. Pending invites are
    /// cleared.
    pub fn restore(&self, snapshot: RegistrySnapshot) -> RestoreReport {
        let (rebuilt, repairs) = RegistryState::rebuild(snapshot.towns, snapshot.affiliations);
        let report = RestoreReport {
            towns: rebuilt.towns.len(),
            affiliations: rebuilt.affiliations.len(),
            repairs,
        };

        *self.state.write() = rebuilt;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TownSettings;

    fn registry() -> TownRegistry {
        TownRegistry::new(SettingsHandle::default())
    }

    fn overworld(x: i32, z: i32) -> ClaimPos {
        ClaimPos::new("overworld", x, z)
    }

    /// Creates a town with a leader and `extra` citizens who joined by invite.
    fn town_with_members(registry: &TownRegistry, name: &str, extra: usize) -> (TownId, PlayerId, Vec<PlayerId>) {
        let leader = PlayerId::new();
        let town = registry.create_town(name, leader).unwrap();
        let mut members = Vec::new();
        for _ in 0..extra {
            let member = PlayerId::new();
            registry.invite(town.id(), leader, member).unwrap();
            registry.join_town(town.id(), member).unwrap();
            members.push(member);
        }
        (town.id(), leader, members)
    }

    #[test]
    fn test_create_town_sets_leader_affiliation() {
        let registry = registry();
        let leader = PlayerId::new();
        let town = registry.create_town("Alpha", leader).unwrap();

        assert!(registry.affiliation(leader).is(town.id(), Rank::Leader));
        assert_eq!(registry.town_of_player(leader).unwrap().id(), town.id());
        assert!(!town.is_public_join());
    }

    #[test]
    fn test_create_town_rejections() {
        let registry = registry();
        let leader = PlayerId::new();
        registry.create_town("Alpha", leader).unwrap();

        assert_eq!(registry.create_town("Beta", leader), Err(TownError::AlreadyAffiliated));
        assert_eq!(registry.create_town("ALPHA", PlayerId::new()), Err(TownError::NameTaken));
        assert_eq!(
            registry.create_town("two words", PlayerId::new()),
            Err(TownError::InvalidName { max: 32 })
        );
        assert_eq!(registry.create_town("", PlayerId::new()), Err(TownError::InvalidName { max: 32 }));
        assert_eq!(registry.town_count(), 1);
    }

    #[test]
    fn test_create_town_uses_live_public_default() {
        let registry = registry();
        let mut settings = TownSettings::default();
        settings.default_public_join = true;
        registry.settings().store(settings);

        let town = registry.create_town("Open", PlayerId::new()).unwrap();
        assert!(town.is_public_join());
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let registry = registry();
        let town = registry.create_town("Riverside", PlayerId::new()).unwrap();

        assert_eq!(registry.town_by_name("riverSIDE").unwrap().id(), town.id());
        assert!(registry.town_by_name("Hillside").is_none());
    }

    #[test]
    fn test_join_requires_invite_or_public() {
        let registry = registry();
        let (town, leader, _) = town_with_members(&registry, "Alpha", 0);
        let player = PlayerId::new();

        assert_eq!(registry.join_town(town, player), Err(TownError::NotInvited));

        registry.set_public_join(town, leader, true).unwrap();
        registry.join_town(town, player).unwrap();
        assert!(registry.affiliation(player).is(town, Rank::Citizen));
        assert_eq!(registry.join_town(town, player), Err(TownError::AlreadyAffiliated));
        assert_eq!(registry.join_town(TownId::new(), PlayerId::new()), Err(TownError::NotFound));
    }

    #[test]
    fn test_join_consumes_invite() {
        let registry = registry();
        let (town, leader, _) = town_with_members(&registry, "Alpha", 0);
        let player = PlayerId::new();

        registry.invite(town, leader, player).unwrap();
        registry.join_town(town, player).unwrap();

        assert!(registry.pending_invites(player).is_empty());
    }

    #[test]
    fn test_leader_must_transfer_before_leaving() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);

        assert_eq!(registry.leave_town(leader), Err(TownError::SoleLeaderMustTransfer));

        registry.set_rank(town, leader, members[0], Rank::Leader).unwrap();
        assert_eq!(registry.leave_town(leader), Ok(LeaveOutcome::Left));
        assert_eq!(registry.affiliation(leader), PlayerAffiliation::default());
        assert_eq!(registry.town(town).unwrap().leader(), members[0]);
    }

    #[test]
    fn test_officer_may_leave() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);
        registry.set_rank(town, leader, members[0], Rank::Officer).unwrap();

        assert_eq!(registry.leave_town(members[0]), Ok(LeaveOutcome::Left));
        assert!(!registry.town(town).unwrap().is_member(members[0]));
    }

    #[test]
    fn test_last_member_leaving_disbands_town() {
        let registry = registry();
        let (town, leader, _) = town_with_members(&registry, "Alpha", 0);
        registry.claim_chunk(town, leader, overworld(0, 0)).unwrap();

        assert_eq!(registry.leave_town(leader), Ok(LeaveOutcome::Disbanded));
        assert!(registry.town(town).is_none());
        assert!(!registry.is_claimed(&overworld(0, 0)));
        assert!(registry.create_town("alpha", PlayerId::new()).is_ok());
    }

    #[test]
    fn test_leave_when_unaffiliated() {
        let registry = registry();
        assert_eq!(registry.leave_town(PlayerId::new()), Err(TownError::NotAffiliated));
    }

    #[test]
    fn test_rank_transitions() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 2);
        let (a, b) = (members[0], members[1]);

        assert_eq!(registry.set_rank(town, leader, a, Rank::Citizen), Err(TownError::InvalidTransition));
        registry.set_rank(town, leader, a, Rank::Officer).unwrap();
        assert_eq!(registry.set_rank(town, leader, a, Rank::Officer), Err(TownError::InvalidTransition));
        assert_eq!(registry.set_rank(town, a, b, Rank::Officer), Err(TownError::NotLeader));
        assert_eq!(registry.set_rank(town, leader, leader, Rank::Leader), Err(TownError::InvalidTransition));
        assert_eq!(registry.set_rank(town, leader, leader, Rank::Citizen), Err(TownError::InvalidTransition));
        assert_eq!(
            registry.set_rank(town, leader, PlayerId::new(), Rank::Officer),
            Err(TownError::NotMember)
        );

        registry.set_rank(town, leader, a, Rank::Citizen).unwrap();
        assert!(registry.affiliation(a).is(town, Rank::Citizen));
    }

    #[test]
    fn test_leadership_transfer_demotes_old_leader() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);
        let heir = members[0];

        registry.set_rank(town, leader, heir, Rank::Leader).unwrap();

        assert!(registry.affiliation(heir).is(town, Rank::Leader));
        assert!(registry.affiliation(leader).is(town, Rank::Citizen));
        assert_eq!(registry.town(town).unwrap().leader(), heir);
        assert_eq!(registry.disband_town(town, leader), Err(TownError::NotLeader));
    }

    #[test]
    fn test_invite_rules() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);
        let outsider = PlayerId::new();

        assert_eq!(registry.invite(town, leader, members[0]), Err(TownError::AlreadyMember));
        assert_eq!(registry.invite(town, members[0], outsider), Err(TownError::NotLeader));

        registry.invite(town, leader, outsider).unwrap();
        registry.invite(town, leader, outsider).unwrap();
        assert_eq!(registry.pending_invites(outsider), vec![town]);

        registry.revoke_invite(town, leader, outsider).unwrap();
        assert_eq!(registry.revoke_invite(town, leader, outsider), Err(TownError::NoSuchInvite));
    }

    #[test]
    fn test_respond_to_invite() {
        let registry = registry();
        let (alpha, alpha_leader, _) = town_with_members(&registry, "Alpha", 0);
        let (beta, beta_leader, _) = town_with_members(&registry, "Beta", 0);
        let player = PlayerId::new();

        assert_eq!(registry.respond_to_invite(alpha, player, true), Err(TownError::NoSuchInvite));

        registry.invite(alpha, alpha_leader, player).unwrap();
        registry.invite(beta, beta_leader, player).unwrap();

        registry.respond_to_invite(alpha, player, false).unwrap();
        assert_eq!(registry.pending_invites(player), vec![beta]);

        registry.respond_to_invite(beta, player, true).unwrap();
        assert!(registry.affiliation(player).is(beta, Rank::Citizen));

        registry.invite(alpha, alpha_leader, player).unwrap();
        assert_eq!(registry.respond_to_invite(alpha, player, true), Err(TownError::AlreadyAffiliated));
        assert!(registry.pending_invites(player).contains(&alpha));
    }

    #[test]
    fn test_claim_permissions() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);
        let citizen = members[0];

        assert_eq!(registry.claim_chunk(town, citizen, overworld(1, 1)), Err(TownError::Forbidden));
        assert_eq!(registry.claim_chunk(town, PlayerId::new(), overworld(1, 1)), Err(TownError::Forbidden));

        registry.set_rank(town, leader, citizen, Rank::Officer).unwrap();
        registry.claim_chunk(town, citizen, overworld(1, 1)).unwrap();
        assert_eq!(registry.town_at(&overworld(1, 1)).unwrap().id(), town);
    }

    #[test]
    fn test_claims_are_exclusive() {
        let registry = registry();
        let (alpha, alpha_leader, _) = town_with_members(&registry, "Alpha", 0);
        let (beta, beta_leader, _) = town_with_members(&registry, "Beta", 0);

        registry.claim_chunk(alpha, alpha_leader, overworld(0, 0)).unwrap();

        assert_eq!(registry.claim_chunk(alpha, alpha_leader, overworld(0, 0)), Err(TownError::AlreadyClaimed));
        assert_eq!(registry.claim_chunk(beta, beta_leader, overworld(0, 0)), Err(TownError::AlreadyClaimed));
        assert!(registry.claim_chunk(beta, beta_leader, ClaimPos::new("nether", 0, 0)).is_ok());
    }

    #[test]
    fn test_claim_limit_enforced() {
        let registry = registry();
        let (town, leader, _) = town_with_members(&registry, "Alpha", 0);

        for x in 0..10 {
            registry.claim_chunk(town, leader, overworld(x, 0)).unwrap();
        }
        assert_eq!(
            registry.claim_chunk(town, leader, overworld(10, 0)),
            Err(TownError::LimitReached { current: 10, limit: 10 })
        );
        assert_eq!(registry.claims_of(town).unwrap().len(), 10);
        assert!(!registry.is_claimed(&overworld(10, 0)));
    }

    #[test]
    fn test_claim_limit_follows_live_settings() {
        let registry = registry();
        let (town, leader, _) = town_with_members(&registry, "Alpha", 0);
        assert_eq!(registry.claim_limit(town), Ok(10));

        let mut settings = TownSettings::default();
        settings.base_claims = 1;
        settings.claims_per_member = 0;
        registry.settings().store(settings);

        assert_eq!(registry.claim_limit(town), Ok(1));
        registry.claim_chunk(town, leader, overworld(0, 0)).unwrap();
        assert!(matches!(
            registry.claim_chunk(town, leader, overworld(1, 0)),
            Err(TownError::LimitReached { .. })
        ));
    }

    #[test]
    fn test_unclaim() {
        let registry = registry();
        let (alpha, alpha_leader, _) = town_with_members(&registry, "Alpha", 0);
        let (beta, beta_leader, _) = town_with_members(&registry, "Beta", 0);
        registry.claim_chunk(alpha, alpha_leader, overworld(0, 0)).unwrap();

        assert_eq!(registry.unclaim_chunk(beta, beta_leader, &overworld(0, 0)), Err(TownError::NotClaimed));
        assert_eq!(registry.unclaim_chunk(alpha, beta_leader, &overworld(0, 0)), Err(TownError::Forbidden));

        registry.unclaim_chunk(alpha, alpha_leader, &overworld(0, 0)).unwrap();
        assert!(registry.town_at(&overworld(0, 0)).is_none());
        registry.claim_chunk(beta, beta_leader, overworld(0, 0)).unwrap();
    }

    #[test]
    fn test_metadata_limits() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);

        registry.set_description(town, leader, "A quiet fishing village").unwrap();
        registry.set_motd(town, leader, "Welcome home").unwrap();
        assert_eq!(
            registry.set_description(town, leader, &"x".repeat(201)),
            Err(TownError::DescriptionTooLong { max: 200 })
        );
        assert_eq!(registry.set_motd(town, leader, &"y".repeat(201)), Err(TownError::MotdTooLong { max: 200 }));
        assert_eq!(registry.set_motd(town, members[0], "hi"), Err(TownError::NotLeader));

        let summary = registry.summary(town).unwrap();
        assert_eq!(summary.description, "A quiet fishing village");
        assert_eq!(summary.motd, "Welcome home");
        assert_eq!(summary.member_count, 2);
        assert_eq!(summary.claim_limit, 12);
    }

    #[test]
    fn test_roster_groups_by_rank() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 2);
        registry.set_rank(town, leader, members[0], Rank::Officer).unwrap();

        let roster = registry.roster(town).unwrap();
        assert_eq!(roster.leader, leader);
        assert_eq!(roster.officers, vec![members[0]]);
        assert_eq!(roster.citizens, vec![members[1]]);
    }

    #[test]
    fn test_disband_releases_everything() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 1);
        let invitee = PlayerId::new();
        registry.invite(town, leader, invitee).unwrap();
        registry.claim_chunk(town, leader, overworld(3, 3)).unwrap();

        assert_eq!(registry.disband_town(town, members[0]), Err(TownError::NotLeader));
        registry.disband_town(town, leader).unwrap();

        assert!(registry.town(town).is_none());
        assert!(registry.town_by_name("Alpha").is_none());
        assert!(!registry.is_claimed(&overworld(3, 3)));
        assert_eq!(registry.affiliation(leader), PlayerAffiliation::default());
        assert_eq!(registry.affiliation(members[0]), PlayerAffiliation::default());
        assert!(registry.pending_invites(invitee).is_empty());
        assert_eq!(registry.disband_town(town, leader), Err(TownError::NotFound));
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let registry = registry();
        let (town, leader, members) = town_with_members(&registry, "Alpha", 2);
        registry.set_rank(town, leader, members[0], Rank::Officer).unwrap();
        registry.claim_chunk(town, members[0], overworld(5, 5)).unwrap();

        let snapshot = registry.snapshot();
        let restored = TownRegistry::new(SettingsHandle::default());
        let report = restored.restore(snapshot.clone());

        assert_eq!(report.repairs, 0);
        assert_eq!(report.towns, 1);
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.town_at(&overworld(5, 5)).unwrap().id(), town);
        assert_eq!(restored.town_by_name("alpha").unwrap().id(), town);
    }

    #[test]
    fn test_restore_repairs_conflicts() {
        let shared_member = PlayerId::new();
        let claim = overworld(0, 0);

        let first_id = TownId(uuid::Uuid::from_u128(1));
        let second_id = TownId(uuid::Uuid::from_u128(2));
        let first_leader = PlayerId::new();
        let second_leader = PlayerId::new();

        let mut first = Town::new(first_id, "Alpha", first_leader, false);
        first.add_member(shared_member);
        first.add_claim(claim.clone());

        let mut second = Town::new(second_id, "Beta", second_leader, false);
        second.add_member(shared_member);
        second.add_claim(claim.clone());

        let duplicate_name = Town::new(TownId(uuid::Uuid::from_u128(3)), "ALPHA", PlayerId::new(), false);

        let stray = PlayerId::new();
        let affiliations: AffiliationTable = [
            (stray, PlayerAffiliation::member_of(TownId::new(), Rank::Officer)),
            (second_leader, PlayerAffiliation::member_of(second_id, Rank::Citizen)),
        ]
        .into_iter()
        .collect();

        let registry = registry();
        let report = registry.restore(RegistrySnapshot {
            towns: vec![second, duplicate_name, first],
            affiliations,
        });

        assert_eq!(report.towns, 2);
        assert!(report.repairs > 0);
        assert_eq!(registry.town_at(&claim).unwrap().id(), first_id);
        assert!(registry.affiliation(shared_member).is(first_id, Rank::Citizen));
        assert!(!registry.town(second_id).unwrap().is_member(shared_member));
        assert!(registry.affiliation(second_leader).is(second_id, Rank::Leader));
        assert_eq!(registry.affiliation(stray), PlayerAffiliation::default());
    }
}
