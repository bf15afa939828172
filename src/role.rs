//! Role symbols carried by every world.
//!
//! Each world assigns one symbol per player. Cabal members carry the
//! sub-symbols `A`/`B`/`C` (`A` is the alpha, who performs the
//! elimination), the optional capabilities carry `D`/`E`/`F`/`G`,
//! ordinary players carry `T`, and the overlay symbols `X`/`V` mark a
//! player removed in that world by elimination or by vote.

use serde::{Deserialize, Serialize};

/// One player's role symbol within a single world.
///
/// # Examples
///
/// ```
/// use collapsar::Role;
///
/// let role = Role::from_char('B').unwrap();
/// assert!(role.is_cabal());
/// assert_eq!(role.normalize_cabal(), Role::CabalAlpha);
/// assert_eq!(Role::Seer.as_char(), 'D');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Cabal leader; carries out the night elimination.
    CabalAlpha,
    /// Second cabal member.
    CabalBeta,
    /// Third cabal member.
    CabalGamma,
    /// Investigates one player per night.
    Seer,
    /// Creates bonds between players; quantum-immortal while any
    /// world still disagrees about who holds this symbol.
    Binder,
    /// Watches one player per night.
    Watcher,
    /// Protects one player per night.
    Warden,
    /// Ordinary player with no capability.
    Citizen,
    /// Overlay: removed in this world by elimination.
    Slain,
    /// Overlay: removed in this world by vote.
    Exiled,
}

impl Role {
    /// All symbols that can appear in a freshly generated world.
    pub const ASSIGNABLE: [Self; 8] = [
        Self::CabalAlpha,
        Self::CabalBeta,
        Self::CabalGamma,
        Self::Seer,
        Self::Binder,
        Self::Watcher,
        Self::Warden,
        Self::Citizen,
    ];

    /// Wire symbol for this role.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::CabalAlpha => 'A',
            Self::CabalBeta => 'B',
            Self::CabalGamma => 'C',
            Self::Seer => 'D',
            Self::Binder => 'E',
            Self::Watcher => 'F',
            Self::Warden => 'G',
            Self::Citizen => 'T',
            Self::Slain => 'X',
            Self::Exiled => 'V',
        }
    }

    /// Parses a wire symbol. Returns `None` for anything outside the
    /// role alphabet.
    #[must_use]
    pub const fn from_char(symbol: char) -> Option<Self> {
        match symbol {
            'A' => Some(Self::CabalAlpha),
            'B' => Some(Self::CabalBeta),
            'C' => Some(Self::CabalGamma),
            'D' => Some(Self::Seer),
            'E' => Some(Self::Binder),
            'F' => Some(Self::Watcher),
            'G' => Some(Self::Warden),
            'T' => Some(Self::Citizen),
            'X' => Some(Self::Slain),
            'V' => Some(Self::Exiled),
            _ => None,
        }
    }

    /// Returns true for any cabal sub-symbol.
    #[must_use]
    pub const fn is_cabal(self) -> bool {
        matches!(self, Self::CabalAlpha | Self::CabalBeta | Self::CabalGamma)
    }

    /// Returns true for the overlay symbols marking a removed player.
    #[must_use]
    pub const fn is_removed(self) -> bool {
        matches!(self, Self::Slain | Self::Exiled)
    }

    /// Returns true if the player is still alive in this world.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !self.is_removed()
    }

    /// Returns true for the optional capability symbols.
    #[must_use]
    pub const fn is_capability(self) -> bool {
        matches!(self, Self::Seer | Self::Binder | Self::Watcher | Self::Warden)
    }

    /// Folds the cabal sub-symbols into the alpha symbol. Which
    /// sub-symbol a cabal member carries is bookkeeping, not
    /// identity, so certainty comparisons always normalize first.
    #[must_use]
    pub const fn normalize_cabal(self) -> Self {
        match self {
            Self::CabalBeta | Self::CabalGamma => Self::CabalAlpha,
            other => other,
        }
    }

    /// Returns a human-readable role name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CabalAlpha => "cabal alpha",
            Self::CabalBeta => "cabal beta",
            Self::CabalGamma => "cabal gamma",
            Self::Seer => "seer",
            Self::Binder => "binder",
            Self::Watcher => "watcher",
            Self::Warden => "warden",
            Self::Citizen => "citizen",
            Self::Slain => "slain",
            Self::Exiled => "exiled",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
