//! Player identity and the liveness board.
//!
//! Players are seats 0..N addressed on the wire by the letters
//! `A`..`Z`. The liveness board is the permanent, cross-phase record
//! of what is certain about each player: their identity once it is
//! known in every surviving world, and their status once they are
//! removed in every surviving world. Worlds disagree; the board never
//! does.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::role::Role;

/// Stable player identifier: a seat index mapped to a wire letter.
///
/// # Examples
///
/// ```
/// use collapsar::PlayerId;
///
/// let player = PlayerId::from_letter('C').unwrap();
/// assert_eq!(player.index(), 2);
/// assert_eq!(player.letter(), 'C');
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    /// The wire format addresses players by single capital letters,
    /// so a game never seats more than 26.
    pub const MAX_PLAYERS: usize = 26;

    /// Creates a player id from a seat index.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < Self::MAX_PLAYERS);
        Self(index as u8)
    }

    /// Returns the seat index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Wire letter for this player (`'A'` for seat 0).
    #[must_use]
    pub const fn letter(self) -> char {
        (b'A' + self.0) as char
    }

    /// Parses a wire letter. Returns `None` outside `'A'..='Z'`.
    #[must_use]
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A'..='Z' => Some(Self(letter as u8 - b'A')),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Why a player left play. Selects both the overlay symbol written
/// into each world and the permanent status recorded on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// Removed by the cabal's night elimination.
    Eliminated,
    /// Removed by the day vote.
    Voted,
}

impl RemovalCause {
    /// Overlay symbol this removal writes into a world.
    #[must_use]
    pub const fn overlay(self) -> Role {
        match self {
            Self::Eliminated => Role::Slain,
            Self::Voted => Role::Exiled,
        }
    }

    /// Board status this removal records.
    #[must_use]
    pub const fn status(self) -> PlayerStatus {
        match self {
            Self::Eliminated => PlayerStatus::Slain,
            Self::Voted => PlayerStatus::Exiled,
        }
    }
}

/// A player's status on the liveness board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Alive in at least one surviving world.
    Alive,
    /// Certainly removed by elimination.
    Slain,
    /// Certainly removed by vote.
    Exiled,
}

impl PlayerStatus {
    /// Wire character for this status.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Alive => '#',
            Self::Slain => 'X',
            Self::Exiled => 'V',
        }
    }

    /// Parses a wire status character.
    #[must_use]
    pub const fn from_char(symbol: char) -> Option<Self> {
        match symbol {
            '#' => Some(Self::Alive),
            'X' => Some(Self::Slain),
            'V' => Some(Self::Exiled),
            _ => None,
        }
    }

    /// Returns true while the player is alive somewhere.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// What is certainly known about one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Certain identity, normalized to the cabal alpha for cabal
    /// members. `None` while surviving worlds still disagree.
    pub identity: Option<Role>,
    /// Certain removal status.
    pub status: PlayerStatus,
}

impl PlayerRecord {
    const fn unknown() -> Self {
        Self {
            identity: None,
            status: PlayerStatus::Alive,
        }
    }
}

/// The permanent per-player certainty record, two wire characters per
/// player: identity letter or `#`, then status (`#`, `X` or `V`).
///
/// Identity, once certain, never changes; status only moves away from
/// alive. Both invariants hold because every write comes from a fact
/// true in all surviving worlds, and collapse only shrinks that set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessBoard {
    records: Vec<PlayerRecord>,
}

impl LivenessBoard {
    /// Creates a board with every player alive and unknown.
    #[must_use]
    pub fn new(players: usize) -> Self {
        Self {
            records: vec![PlayerRecord::unknown(); players],
        }
    }

    /// Number of seats on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true for a zero-seat board.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full record for one player.
    #[must_use]
    pub fn record(&self, player: PlayerId) -> PlayerRecord {
        self.records[player.index()]
    }

    /// Certain identity for one player, if any.
    #[must_use]
    pub fn identity(&self, player: PlayerId) -> Option<Role> {
        self.records[player.index()].identity
    }

    /// Board status for one player.
    #[must_use]
    pub fn status(&self, player: PlayerId) -> PlayerStatus {
        self.records[player.index()].status
    }

    /// Returns true while the player is alive in some world.
    #[must_use]
    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.status(player).is_alive()
    }

    /// Count of players still alive somewhere.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status.is_alive())
            .count()
    }

    /// Iterates every seat in order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        (0..self.records.len()).map(PlayerId::from_index)
    }

    /// Records a certain removal: identity plus the status implied by
    /// the removal cause.
    pub fn resolve(&mut self, player: PlayerId, identity: Role, cause: RemovalCause) {
        let record = &mut self.records[player.index()];
        debug_assert!(
            record.identity.is_none() || record.identity == Some(identity),
            "identity of {player} may not change once certain"
        );
        record.identity = Some(identity);
        record.status = cause.status();
    }

    /// Records a certain identity for a player whose status is
    /// untouched. No-op when the identity is already known.
    pub fn promote_identity(&mut self, player: PlayerId, identity: Role) {
        let record = &mut self.records[player.index()];
        if record.identity.is_none() {
            record.identity = Some(identity);
        }
    }

    /// Renders the two-characters-per-player wire line.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut line = String::with_capacity(self.records.len() * 2);
        for record in &self.records {
            line.push(record.identity.map_or('#', Role::as_char));
            line.push(record.status.as_char());
        }
        line
    }

    /// Parses the wire line for a known seat count.
    pub fn from_wire(line: &str, players: usize) -> Result<Self, StoreError> {
        let symbols: Vec<char> = line.chars().collect();
        if symbols.len() != players * 2 {
            return Err(StoreError::MalformedHeader {
                field: "liveness",
                detail: format!(
                    "expected {} characters for {players} players, got {}",
                    players * 2,
                    symbols.len()
                ),
            });
        }
        let mut records = Vec::with_capacity(players);
        for pair in symbols.chunks_exact(2) {
            let identity = match pair[0] {
                '#' => None,
                symbol => Some(
                    Role::from_char(symbol)
                        .ok_or(StoreError::UnknownSymbol { symbol })?,
                ),
            };
            let status = PlayerStatus::from_char(pair[1])
                .ok_or(StoreError::UnknownSymbol { symbol: pair[1] })?;
            records.push(PlayerRecord { identity, status });
        }
        Ok(Self { records })
    }
}
