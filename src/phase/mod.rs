//! Phase identity and phase outcomes.
//!
//! A game alternates `N0, D1, N1, D2, ...`. The bootstrap night `N0`
//! is special: it runs before any elimination, resolves only bond
//! nominations, and leaves the world set untouched. Each phase knows
//! which snapshot and bond files it reads and writes and which RNG
//! stream it draws from, so a transition is reproducible from the
//! game seed and the phase alone.

pub mod check;
pub mod day;
pub mod night;

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::collapse::{Promotion, Reveal};
use crate::config::{CapabilityFlags, Setup};
use crate::error::StoreError;
use crate::player::LivenessBoard;
use crate::role::Role;
use crate::victory::Victory;

/// One phase of a game. Days are numbered from 1, nights from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseId {
    /// Night `n`; `Night(0)` is the bootstrap night.
    Night(u32),
    /// Day `n`, starting at 1.
    Day(u32),
}

impl PhaseId {
    /// The phase number within its kind.
    #[must_use]
    pub const fn number(self) -> u32 {
        match self {
            Self::Night(n) | Self::Day(n) => n,
        }
    }

    /// Returns true for the bootstrap night.
    #[must_use]
    pub const fn is_bootstrap(self) -> bool {
        matches!(self, Self::Night(0))
    }

    /// RNG stream for this phase. Stream 0 is reserved for setup;
    /// phases count up from 1 in play order.
    #[must_use]
    pub const fn stream(self) -> u64 {
        match self {
            Self::Night(n) => 2 * n as u64 + 1,
            Self::Day(n) => 2 * n as u64,
        }
    }

    /// Snapshot file this phase reads. The bootstrap night reads the
    /// origin snapshot (for its header only).
    #[must_use]
    pub fn worlds_in(self) -> String {
        match self {
            Self::Night(0) => "worlds-D1.txt".to_string(),
            Self::Night(n) => format!("worlds-N{n}.txt"),
            Self::Day(n) => format!("worlds-D{n}.txt"),
        }
    }

    /// Snapshot file this phase writes, `None` for the bootstrap
    /// night, which never touches the world set.
    #[must_use]
    pub fn worlds_out(self) -> Option<String> {
        match self {
            Self::Night(0) => None,
            Self::Night(n) => Some(format!("worlds-D{}.txt", n + 1)),
            Self::Day(n) => Some(format!("worlds-N{n}.txt")),
        }
    }

    /// Bond file this phase reads, `None` for the bootstrap night,
    /// which runs before any bond exists.
    #[must_use]
    pub fn bonds_in(self) -> Option<String> {
        match self {
            Self::Night(0) => None,
            Self::Night(n) => Some(format!("bonds-N{n}.txt")),
            Self::Day(n) => Some(format!("bonds-D{n}.txt")),
        }
    }

    /// Bond file this phase writes.
    #[must_use]
    pub fn bonds_out(self) -> String {
        match self {
            Self::Night(n) => format!("bonds-D{}.txt", n + 1),
            Self::Day(n) => format!("bonds-N{n}.txt"),
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Night(n) => write!(f, "N{n}"),
            Self::Day(n) => write!(f, "D{n}"),
        }
    }
}

impl Serialize for PhaseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Worlds removed by each resolution-time collapse cause. Worlds
/// pruned later by flips are visible only in the before/after counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollapseTally {
    /// The elimination target was a fellow cabal member.
    pub cabal_on_cabal: u64,
    /// The target held the binder after a non-binder elimination had
    /// already succeeded somewhere, or a side set was discarded.
    pub binder_immortality: u64,
    /// The warden intercepted the seer while the seer survived.
    pub seer_meets_warden: u64,
    /// The vote target was already slain in that world.
    pub already_removed: u64,
}

impl CollapseTally {
    /// Total worlds collapsed during resolution.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.cabal_on_cabal
            + self.binder_immortality
            + self.seer_meets_warden
            + self.already_removed
    }
}

/// Everything one phase transition produced, serializable for the
/// external report generators.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    /// The phase that ran.
    pub phase: PhaseId,
    /// Worlds read from the incoming snapshot.
    pub worlds_before: u64,
    /// Worlds written to the outgoing snapshot (or surviving, on a
    /// terminal outcome).
    pub worlds_after: u64,
    /// Resolution-time collapse causes.
    pub tally: CollapseTally,
    /// Players revealed dead this phase, in resolution order.
    pub reveals: Vec<Reveal>,
    /// Identities promoted without a death.
    pub promotions: Vec<Promotion>,
    /// Setup line after the phase.
    pub setup: Setup,
    /// Liveness board wire line after the phase.
    pub liveness: String,
    /// Bonds retired this phase, by the closing pass or by eviction.
    pub bonds_closed: usize,
    /// Bonds formed by the creation pass.
    pub bonds_created: usize,
    /// Terminal outcome, if the game ended this phase.
    pub victory: Option<Victory>,
}

/// Errors when a phase output file already exists. Run before any
/// work, so a refused transition leaves nothing behind.
pub(crate) fn refuse_existing(path: &Path) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Recomputes the setup line after a phase: the live player count
/// comes from the board, and a capability switches off when its
/// holder is certainly dead. The cabal count is the caller's (nights
/// carry it over, days recount it).
pub(crate) fn surviving_setup(
    board: &LivenessBoard,
    cabal_left: usize,
    mut flags: CapabilityFlags,
) -> Setup {
    for player in board.players() {
        if board.is_alive(player) {
            continue;
        }
        match board.identity(player) {
            Some(Role::Seer) => flags.seer = false,
            Some(Role::Binder) => flags.binder = false,
            Some(Role::Watcher) => flags.watcher = false,
            Some(Role::Warden) => flags.warden = false,
            _ => {}
        }
    }
    Setup {
        players_left: board.living_count(),
        cabal_left,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(PhaseId::Night(0).to_string(), "N0");
        assert_eq!(PhaseId::Day(1).to_string(), "D1");
        assert_eq!(PhaseId::Night(12).to_string(), "N12");
    }

    #[test]
    fn test_phase_streams_count_up_in_play_order() {
        assert_eq!(PhaseId::Night(0).stream(), 1);
        assert_eq!(PhaseId::Day(1).stream(), 2);
        assert_eq!(PhaseId::Night(1).stream(), 3);
        assert_eq!(PhaseId::Day(2).stream(), 4);
        assert_eq!(PhaseId::Night(2).stream(), 5);
    }

    #[test]
    fn test_phase_file_names() {
        let bootstrap = PhaseId::Night(0);
        assert_eq!(bootstrap.worlds_in(), "worlds-D1.txt");
        assert_eq!(bootstrap.worlds_out(), None);
        assert_eq!(bootstrap.bonds_in(), None);
        assert_eq!(bootstrap.bonds_out(), "bonds-D1.txt");

        let day = PhaseId::Day(2);
        assert_eq!(day.worlds_in(), "worlds-D2.txt");
        assert_eq!(day.worlds_out(), Some("worlds-N2.txt".to_string()));
        assert_eq!(day.bonds_in(), Some("bonds-D2.txt".to_string()));
        assert_eq!(day.bonds_out(), "bonds-N2.txt");

        let night = PhaseId::Night(2);
        assert_eq!(night.worlds_in(), "worlds-N2.txt");
        assert_eq!(night.worlds_out(), Some("worlds-D3.txt".to_string()));
        assert_eq!(night.bonds_in(), Some("bonds-N2.txt".to_string()));
        assert_eq!(night.bonds_out(), "bonds-D3.txt");
    }

    #[test]
    fn test_phase_serializes_as_wire_name() {
        let json = serde_json::to_string(&PhaseId::Night(1)).unwrap();
        assert_eq!(json, "\"N1\"");
    }

    #[test]
    fn test_tally_total() {
        let tally = CollapseTally {
            cabal_on_cabal: 3,
            binder_immortality: 10,
            seer_meets_warden: 2,
            already_removed: 1,
        };
        assert_eq!(tally.total(), 16);
        assert_eq!(CollapseTally::default().total(), 0);
    }

    #[test]
    fn test_surviving_setup_clears_dead_capabilities() {
        use crate::player::{PlayerId, RemovalCause};

        let mut board = LivenessBoard::new(5);
        board.resolve(PlayerId::from_index(1), Role::Seer, RemovalCause::Eliminated);
        board.resolve(PlayerId::from_index(3), Role::Citizen, RemovalCause::Voted);
        // A promoted identity with a living holder changes nothing.
        board.promote_identity(PlayerId::from_index(2), Role::Warden);

        let setup = surviving_setup(&board, 1, CapabilityFlags::all());
        assert_eq!(setup.players_left, 3);
        assert_eq!(setup.cabal_left, 1);
        assert!(!setup.flags.seer);
        assert!(setup.flags.binder);
        assert!(setup.flags.watcher);
        assert!(setup.flags.warden);
    }

    #[test]
    fn test_refuse_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worlds-D2.txt");
        assert!(refuse_existing(&path).is_ok());
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            refuse_existing(&path),
            Err(StoreError::AlreadyExists { .. })
        ));
    }
}
