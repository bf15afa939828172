//! Worlds and world sets.
//!
//! A world is one fully specified, internally consistent hypothesis
//! about every player's true role. The world set holds every
//! hypothesis still consistent with all revealed information; play
//! only ever shrinks it. Sets can reach tens of millions of worlds,
//! so every operation here is a single forward pass and filtering
//! never shifts elements one at a time.

use crate::player::PlayerId;
use crate::role::Role;

/// One candidate assignment of roles to players.
///
/// The ordinal is assigned at generation and never changes, so a
/// world keeps its identity through any number of filtering passes
/// and indexes the origin snapshot directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    ordinal: u64,
    roles: Vec<Role>,
}

impl World {
    /// Creates a world from its generation ordinal and role row.
    #[must_use]
    pub fn new(ordinal: u64, roles: Vec<Role>) -> Self {
        Self { ordinal, roles }
    }

    /// Generation ordinal of this world.
    #[must_use]
    pub const fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Number of seats in this world.
    #[must_use]
    pub fn players(&self) -> usize {
        self.roles.len()
    }

    /// Role symbol this world assigns to a player.
    #[must_use]
    pub fn role(&self, player: PlayerId) -> Role {
        self.roles[player.index()]
    }

    /// Overwrites a player's symbol in this world.
    pub fn set_role(&mut self, player: PlayerId, role: Role) {
        self.roles[player.index()] = role;
    }

    /// The full role row.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Finds the player holding a symbol in this world, if any.
    #[must_use]
    pub fn holder(&self, role: Role) -> Option<PlayerId> {
        self.roles
            .iter()
            .position(|&r| r == role)
            .map(PlayerId::from_index)
    }

    /// Count of players alive in this world.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.roles.iter().filter(|r| r.is_alive()).count()
    }
}

/// The ordered collection of surviving worlds.
///
/// Ordinals are strictly increasing. Every resolution pass produces a
/// subsequence of its input, so membership in a set built from the
/// origin snapshot is equivalent to "still consistent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldSet {
    worlds: Vec<World>,
}

impl WorldSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { worlds: Vec::new() }
    }

    /// Wraps an already-ordered vector of worlds.
    #[must_use]
    pub fn from_worlds(worlds: Vec<World>) -> Self {
        debug_assert!(
            worlds.windows(2).all(|w| w[0].ordinal < w[1].ordinal),
            "world ordinals must be strictly increasing"
        );
        Self { worlds }
    }

    /// Number of surviving worlds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    /// Returns true when every world has collapsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Appends a world. Ordinals must arrive in increasing order.
    pub fn push(&mut self, world: World) {
        debug_assert!(
            self.worlds
                .last()
                .is_none_or(|last| last.ordinal < world.ordinal),
            "world ordinals must be strictly increasing"
        );
        self.worlds.push(world);
    }

    /// Iterates the surviving worlds in ordinal order.
    pub fn iter(&self) -> std::slice::Iter<'_, World> {
        self.worlds.iter()
    }

    /// Mutable iteration in ordinal order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, World> {
        self.worlds.iter_mut()
    }

    /// Consumes the set, yielding its worlds.
    #[must_use]
    pub fn into_worlds(self) -> Vec<World> {
        self.worlds
    }

    /// Keeps only worlds matching the predicate. Single compacting
    /// pass; relative order and ordinals are preserved.
    pub fn retain_where<F>(&mut self, predicate: F)
    where
        F: FnMut(&World) -> bool,
    {
        self.worlds.retain(predicate);
    }

    /// Fallible filter: rebuilds the set from worlds the predicate
    /// accepts, aborting on the first error.
    pub fn try_retain<F, E>(&mut self, mut predicate: F) -> Result<(), E>
    where
        F: FnMut(&World) -> Result<bool, E>,
    {
        let drained = std::mem::take(&mut self.worlds);
        let mut kept = Vec::with_capacity(drained.len());
        for world in drained {
            if predicate(&world)? {
                kept.push(world);
            }
        }
        self.worlds = kept;
        Ok(())
    }

    /// Returns true if the player is alive in at least one world.
    #[must_use]
    pub fn anyone_alive(&self, player: PlayerId) -> bool {
        self.worlds.iter().any(|w| w.role(player).is_alive())
    }
}

impl IntoIterator for WorldSet {
    type Item = World;
    type IntoIter = std::vec::IntoIter<World>;

    fn into_iter(self) -> Self::IntoIter {
        self.worlds.into_iter()
    }
}

impl<'a> IntoIterator for &'a WorldSet {
    type Item = &'a World;
    type IntoIter = std::slice::Iter<'a, World>;

    fn into_iter(self) -> Self::IntoIter {
        self.worlds.iter()
    }
}

impl FromIterator<World> for WorldSet {
    fn from_iter<I: IntoIterator<Item = World>>(iter: I) -> Self {
        Self {
            worlds: iter.into_iter().collect(),
        }
    }
}
