//! Game configuration and the per-snapshot setup line.
//!
//! Two layers of state describe a game. `GameConfig` is written once
//! at setup (`game.json`) and never changes: seat count, cabal size,
//! which capabilities the game started with, the RNG seed, and the
//! shuffled public roster order. `Setup` is the live view carried in
//! every snapshot header: the surviving player count, the remaining
//! cabal count, and which capabilities are still active. Capabilities
//! switch off permanently when their holder is certainly dead.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CollapsarError, CollapsarResult, StoreError};
use crate::orders::Capability;
use crate::player::PlayerId;
use crate::rng::PhaseRng;

/// Which optional capabilities are in play, in wire order:
/// seer, binder, watcher, warden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub seer: bool,
    pub binder: bool,
    pub watcher: bool,
    pub warden: bool,
}

impl CapabilityFlags {
    /// All four capabilities enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            seer: true,
            binder: true,
            watcher: true,
            warden: true,
        }
    }

    /// No capability enabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            seer: false,
            binder: false,
            watcher: false,
            warden: false,
        }
    }

    /// Number of active capabilities.
    #[must_use]
    pub const fn active_count(self) -> usize {
        self.seer as usize + self.binder as usize + self.watcher as usize + self.warden as usize
    }

    /// Whether a given capability is active. Elimination is always
    /// available while the game runs.
    #[must_use]
    pub const fn is_active(self, capability: Capability) -> bool {
        match capability {
            Capability::Eliminate => true,
            Capability::Investigate => self.seer,
            Capability::Bond => self.binder,
            Capability::Watch => self.watcher,
            Capability::Protect => self.warden,
        }
    }

    /// Renders the four wire flag characters.
    #[must_use]
    pub fn to_wire(self) -> String {
        [self.seer, self.binder, self.watcher, self.warden]
            .iter()
            .map(|&flag| if flag { '1' } else { '0' })
            .collect()
    }

    /// Parses the four wire flag characters.
    pub fn from_wire(field: &str) -> Result<Self, StoreError> {
        let bits: Vec<char> = field.chars().collect();
        if bits.len() != 4 || bits.iter().any(|c| *c != '0' && *c != '1') {
            return Err(StoreError::MalformedHeader {
                field: "capability flags",
                detail: format!("expected four 0/1 characters, got '{field}'"),
            });
        }
        Ok(Self {
            seer: bits[0] == '1',
            binder: bits[1] == '1',
            watcher: bits[2] == '1',
            warden: bits[3] == '1',
        })
    }
}

/// The live game state carried in every snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    /// Players alive in at least one surviving world.
    pub players_left: usize,
    /// Cabal members not yet certainly dead.
    pub cabal_left: usize,
    /// Capabilities whose holder is not yet certainly dead.
    pub flags: CapabilityFlags,
}

/// Immutable game parameters, persisted as `game.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seat count.
    pub players: usize,
    /// Cabal size.
    pub cabal: usize,
    /// Capabilities this game was set up with.
    pub flags: CapabilityFlags,
    /// Seed for every random draw in the game.
    pub seed: u64,
    /// Shuffled public roster order, one letter per player. Position
    /// in this string is the bond matcher's final tie-break.
    pub roster: String,
}

impl GameConfig {
    const MAX_CABAL: usize = 3;

    /// Builds a config for setup, deriving the shuffled roster order
    /// from the seed.
    pub fn create(
        players: usize,
        cabal: usize,
        flags: CapabilityFlags,
        seed: u64,
    ) -> CollapsarResult<Self> {
        // Clamp before building seats; validate() rejects the count
        // itself when it is out of range.
        let seated = players.min(PlayerId::MAX_PLAYERS);
        let mut seats: Vec<PlayerId> = (0..seated).map(PlayerId::from_index).collect();
        PhaseRng::for_setup(seed).shuffle(&mut seats);
        let roster = seats.iter().map(|p| p.letter()).collect();
        Self {
            players,
            cabal,
            flags,
            seed,
            roster,
        }
        .validate()
    }

    /// Checks internal consistency, returning the config unchanged.
    pub fn validate(self) -> CollapsarResult<Self> {
        if self.players == 0 || self.players > PlayerId::MAX_PLAYERS {
            return Err(CollapsarError::config(format!(
                "player count must be between 1 and {} (got {})",
                PlayerId::MAX_PLAYERS,
                self.players
            )));
        }
        if self.cabal == 0 || self.cabal > Self::MAX_CABAL {
            return Err(CollapsarError::config(format!(
                "cabal size must be between 1 and {} (got {})",
                Self::MAX_CABAL,
                self.cabal
            )));
        }
        if self.assigned_roles() > self.players {
            return Err(CollapsarError::config(format!(
                "{} players cannot seat {} assigned roles",
                self.players,
                self.assigned_roles()
            )));
        }
        let mut seen = [false; PlayerId::MAX_PLAYERS];
        let mut count = 0_usize;
        for letter in self.roster.chars() {
            let player = PlayerId::from_letter(letter)
                .filter(|p| p.index() < self.players)
                .ok_or_else(|| {
                    CollapsarError::config(format!("roster letter '{letter}' is out of range"))
                })?;
            if seen[player.index()] {
                return Err(CollapsarError::config(format!(
                    "roster lists player {player} twice"
                )));
            }
            seen[player.index()] = true;
            count += 1;
        }
        if count != self.players {
            return Err(CollapsarError::config(format!(
                "roster must list all {} players (got {count})",
                self.players
            )));
        }
        Ok(self)
    }

    /// Cabal slots plus active capability slots.
    #[must_use]
    pub const fn assigned_roles(&self) -> usize {
        self.cabal + self.flags.active_count()
    }

    /// A player's slot in the shuffled public roster order.
    #[must_use]
    pub fn board_position(&self, player: PlayerId) -> usize {
        self.roster
            .chars()
            .position(|letter| letter == player.letter())
            .unwrap_or(usize::MAX)
    }

    /// The setup line as it stands before any phase has run.
    #[must_use]
    pub const fn initial_setup(&self) -> Setup {
        Setup {
            players_left: self.players,
            cabal_left: self.cabal,
            flags: self.flags,
        }
    }

    /// Loads `game.json` from a game directory.
    pub fn load(path: &Path) -> CollapsarResult<Self> {
        let raw = fs::read_to_string(path).map_err(StoreError::Io)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CollapsarError::config(format!("bad game file: {e}")))?;
        config.validate()
    }

    /// Writes `game.json`. Refuses to overwrite an existing file.
    pub fn save(&self, path: &Path) -> CollapsarResult<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
                    path: path.to_path_buf(),
                },
                _ => StoreError::Io(e),
            })?;
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| CollapsarError::config(format!("cannot serialize game file: {e}")))?;
        file.write_all(body.as_bytes()).map_err(StoreError::Io)?;
        Ok(())
    }
}
