//! The town entity.
//!
//! A [`Town`] is owned by the [`TownRegistry`](crate::TownRegistry); callers
//! only ever see clones. Mutators are crate-private so the cross-town
//! invariants (unique names, exclusive claims, one town per player) can only
//! be changed through the registry, which checks them first.

use crate::types::{ClaimPos, PlayerId, TownId};
use std::collections::BTreeSet;

/// A named player group with a leader, a member roster and a set of claims.
///
/// The leader is always contained in [`members`](Town::members).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Town {
    id: TownId,
    name: String,
    leader: PlayerId,
    members: BTreeSet<PlayerId>,
    claims: BTreeSet<ClaimPos>,
    description: String,
    motd: String,
    public_join: bool,
}

impl Town {
    /// Creates a town whose only member is its leader.
    pub(crate) fn new(id: TownId, name: impl Into<String>, leader: PlayerId, public_join: bool) -> Self {
        let mut members = BTreeSet::new();
        members.insert(leader);
        Self {
            id,
            name: name.into(),
            leader,
            members,
            claims: BTreeSet::new(),
            description: String::new(),
            motd: String::new(),
            public_join,
        }
    }

    /// Reassembles a town from persisted parts. The leader is added to the
    /// member set if the record omitted it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: TownId,
        name: String,
        leader: PlayerId,
        mut members: BTreeSet<PlayerId>,
        claims: BTreeSet<ClaimPos>,
        description: String,
        motd: String,
        public_join: bool,
    ) -> Self {
        members.insert(leader);
        Self {
            id,
            name,
            leader,
            members,
            claims,
            description,
            motd,
            public_join,
        }
    }

    pub fn id(&self) -> TownId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leader(&self) -> PlayerId {
        self.leader
    }

    pub fn members(&self) -> &BTreeSet<PlayerId> {
        &self.members
    }

    pub fn claims(&self) -> &BTreeSet<ClaimPos> {
        &self.claims
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn motd(&self) -> &str {
        &self.motd
    }

    pub fn is_public_join(&self) -> bool {
        self.public_join
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn owns_claim(&self, pos: &ClaimPos) -> bool {
        self.claims.contains(pos)
    }

    // ------------------------------------------------------------------
    // Registry-only mutation
    // ------------------------------------------------------------------

    pub(crate) fn add_member(&mut self, player: PlayerId) {
        self.members.insert(player);
    }

    /// Removes a member. The leader cannot be removed this way.
    pub(crate) fn remove_member(&mut self, player: PlayerId) -> bool {
        if player == self.leader {
            return false;
        }
        self.members.remove(&player)
    }

    /// Removes every member including the leader, leaving an empty shell that
    /// the registry is about to drop.
    pub(crate) fn drain_members(&mut self) -> BTreeSet<PlayerId> {
        std::mem::take(&mut self.members)
    }

    pub(crate) fn drain_claims(&mut self) -> BTreeSet<ClaimPos> {
        std::mem::take(&mut self.claims)
    }

    /// Hands leadership to an existing member.
    pub(crate) fn set_leader(&mut self, player: PlayerId) {
        debug_assert!(self.members.contains(&player));
        self.leader = player;
    }

    pub(crate) fn add_claim(&mut self, pos: ClaimPos) {
        self.claims.insert(pos);
    }

    pub(crate) fn remove_claim(&mut self, pos: &ClaimPos) -> bool {
        self.claims.remove(pos)
    }

    pub(crate) fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub(crate) fn set_motd(&mut self, motd: impl Into<String>) {
        self.motd = motd.into();
    }

    pub(crate) fn set_public_join(&mut self, public_join: bool) {
        self.public_join = public_join;
    }
}
