//! Night orders and day votes on the wire.
//!
//! A night order string carries one block per player in seat-letter
//! order, blocks separated by `-`. A living player's block lists one
//! target letter (or `#` for none) per capability in slot order:
//! eliminate, investigate, bond, watch, protect, with slots for
//! inactive capabilities removed. Every living player submits a full
//! block every night so the order string itself reveals nothing about
//! who holds which role. Blocks of certainly-dead players are ignored.
//!
//! On the bootstrap night each living block is a single bond
//! nomination. A day vote is a bare string of candidate letters.

use std::fmt;

use crate::config::CapabilityFlags;
use crate::error::OrdersError;
use crate::player::{LivenessBoard, PlayerId};
use crate::rng::PhaseRng;
use crate::role::Role;
use crate::world::WorldSet;

/// The five night capabilities, in wire slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The cabal alpha's elimination. Always in play.
    Eliminate,
    /// The seer's investigation.
    Investigate,
    /// The binder's bond nomination.
    Bond,
    /// The watcher's watch.
    Watch,
    /// The warden's protection.
    Protect,
}

impl Capability {
    /// All capabilities in wire slot order.
    pub const ALL: [Self; 5] = [
        Self::Eliminate,
        Self::Investigate,
        Self::Bond,
        Self::Watch,
        Self::Protect,
    ];

    /// The world symbol whose holder performs this capability.
    #[must_use]
    pub const fn role(self) -> Role {
        match self {
            Self::Eliminate => Role::CabalAlpha,
            Self::Investigate => Role::Seer,
            Self::Bond => Role::Binder,
            Self::Watch => Role::Watcher,
            Self::Protect => Role::Warden,
        }
    }

    /// The verb used in reports and error messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Eliminate => "eliminate",
            Self::Investigate => "investigate",
            Self::Bond => "bond",
            Self::Watch => "watch",
            Self::Protect => "protect",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb())
    }
}

/// One request no surviving world can back: either the actor never
/// holds the capability, or the target is dead wherever they do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedOrder {
    /// The player who submitted the request.
    pub actor: PlayerId,
    /// The capability the request used.
    pub capability: Capability,
    /// The requested target, if the request named one.
    pub target: Option<PlayerId>,
}

impl fmt::Display for UnsupportedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{} {} {}", self.actor, self.capability, target),
            None => write!(f, "{} {}", self.actor, self.capability),
        }
    }
}

/// One living player's parsed slots. `None` means the slot was `#`
/// or its capability is not in this game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerOrders {
    pub eliminate: Option<PlayerId>,
    pub investigate: Option<PlayerId>,
    pub bond: Option<PlayerId>,
    pub watch: Option<PlayerId>,
    pub protect: Option<PlayerId>,
}

impl PlayerOrders {
    /// Parses one player's block on its own, as the pre-check
    /// operation does. Shape checks only.
    pub fn parse(
        player: PlayerId,
        block: &str,
        flags: CapabilityFlags,
        board: &LivenessBoard,
    ) -> Result<Self, OrdersError> {
        let block = block.trim().to_uppercase();
        check_wire(&block, board)?;
        Self::from_block(player, &block, flags, board.len())
    }

    /// The requested target for one capability.
    #[must_use]
    pub const fn target(&self, capability: Capability) -> Option<PlayerId> {
        match capability {
            Capability::Eliminate => self.eliminate,
            Capability::Investigate => self.investigate,
            Capability::Bond => self.bond,
            Capability::Watch => self.watch,
            Capability::Protect => self.protect,
        }
    }

    fn set(&mut self, capability: Capability, target: Option<PlayerId>) {
        match capability {
            Capability::Eliminate => self.eliminate = target,
            Capability::Investigate => self.investigate = target,
            Capability::Bond => self.bond = target,
            Capability::Watch => self.watch = target,
            Capability::Protect => self.protect = target,
        }
    }

    fn from_block(
        player: PlayerId,
        block: &str,
        flags: CapabilityFlags,
        players: usize,
    ) -> Result<Self, OrdersError> {
        let symbols: Vec<char> = block.chars().collect();
        let expected = 1 + flags.active_count();
        if symbols.len() != expected {
            return Err(OrdersError::BlockLength {
                player,
                expected,
                actual: symbols.len(),
            });
        }
        let mut orders = Self::default();
        let mut slot = 0;
        for capability in Capability::ALL {
            if !flags.is_active(capability) {
                continue;
            }
            orders.set(capability, letter_target(symbols[slot], players)?);
            slot += 1;
        }
        Ok(orders)
    }
}

/// All players' parsed night orders plus the canonical raw string
/// (trimmed, uppercased) written into the next snapshot header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightOrders {
    raw: String,
    orders: Vec<Option<PlayerOrders>>,
}

impl NightOrders {
    /// Parses an ordinary night's order string. Any slot may be `#`
    /// here; [`NightOrders::require_eliminators`] decides, against the
    /// world set, which players actually owed an elimination target.
    pub fn parse(
        raw: &str,
        flags: CapabilityFlags,
        board: &LivenessBoard,
    ) -> Result<Self, OrdersError> {
        let raw = raw.trim().to_uppercase();
        check_wire(&raw, board)?;
        let blocks = split_blocks(&raw, board.len())?;
        let mut orders = Vec::with_capacity(board.len());
        for (index, block) in blocks.iter().enumerate() {
            let player = PlayerId::from_index(index);
            if !board.is_alive(player) {
                orders.push(None);
                continue;
            }
            orders.push(Some(PlayerOrders::from_block(
                player,
                block,
                flags,
                board.len(),
            )?));
        }
        Ok(Self { raw, orders })
    }

    /// Parses the bootstrap night's order string: one bond nomination
    /// letter (or `#`) per living player.
    pub fn parse_bootstrap(raw: &str, board: &LivenessBoard) -> Result<Self, OrdersError> {
        let raw = raw.trim().to_uppercase();
        check_wire(&raw, board)?;
        let blocks = split_blocks(&raw, board.len())?;
        let mut orders = Vec::with_capacity(board.len());
        for (index, block) in blocks.iter().enumerate() {
            let player = PlayerId::from_index(index);
            if !board.is_alive(player) {
                orders.push(None);
                continue;
            }
            let symbols: Vec<char> = block.chars().collect();
            if symbols.len() != 1 {
                return Err(OrdersError::BlockLength {
                    player,
                    expected: 1,
                    actual: symbols.len(),
                });
            }
            orders.push(Some(PlayerOrders {
                bond: letter_target(symbols[0], board.len())?,
                ..PlayerOrders::default()
            }));
        }
        Ok(Self { raw, orders })
    }

    /// The canonical raw order string.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// One living player's parsed slots; `None` for a dead seat.
    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<&PlayerOrders> {
        self.orders[player.index()].as_ref()
    }

    /// Iterates living players' orders in seat order.
    pub fn living(&self) -> impl Iterator<Item = (PlayerId, &PlayerOrders)> + '_ {
        self.orders
            .iter()
            .enumerate()
            .filter_map(|(index, orders)| {
                orders.as_ref().map(|o| (PlayerId::from_index(index), o))
            })
    }

    /// Rejects requests no surviving world can back.
    ///
    /// A request `(actor, capability, target)` is supported by a world
    /// when the actor holds the capability's symbol there and the
    /// target is alive there. Eliminate, investigate and protect
    /// requests must each find at least one supporting world; watch
    /// and bond requests resolve against the board alone and are not
    /// scanned. Single forward pass, early exit once every request
    /// has found a witness.
    pub fn validate_targets(&self, worlds: &WorldSet) -> Result<(), OrdersError> {
        let mut pending: Vec<UnsupportedOrder> = Vec::new();
        for (actor, orders) in self.living() {
            for capability in [
                Capability::Eliminate,
                Capability::Investigate,
                Capability::Protect,
            ] {
                if let Some(target) = orders.target(capability) {
                    pending.push(UnsupportedOrder {
                        actor,
                        capability,
                        target: Some(target),
                    });
                }
            }
        }
        for world in worlds {
            if pending.is_empty() {
                break;
            }
            let eliminator = world.holder(Role::CabalAlpha);
            let seer = world.holder(Role::Seer);
            let warden = world.holder(Role::Warden);
            pending.retain(|request| {
                let holder = match request.capability {
                    Capability::Eliminate => eliminator,
                    Capability::Investigate => seer,
                    Capability::Protect => warden,
                    Capability::Bond | Capability::Watch => None,
                };
                let supported = holder == Some(request.actor)
                    && request
                        .target
                        .is_some_and(|target| world.role(target).is_alive());
                !supported
            });
        }
        if pending.is_empty() {
            Ok(())
        } else {
            Err(OrdersError::UnsupportedOrders { orders: pending })
        }
    }

    /// Rejects a missing elimination target from any player who leads
    /// the cabal in at least one surviving world. Players the worlds
    /// rule out as alpha may leave the slot empty; resolution never
    /// reads it.
    pub fn require_eliminators(&self, worlds: &WorldSet) -> Result<(), OrdersError> {
        let mut silent: Vec<PlayerId> = self
            .living()
            .filter(|(_, orders)| orders.eliminate.is_none())
            .map(|(player, _)| player)
            .collect();
        let mut offenders: Vec<PlayerId> = Vec::new();
        for world in worlds {
            if silent.is_empty() {
                break;
            }
            if let Some(alpha) = world.holder(Role::CabalAlpha) {
                if let Some(at) = silent.iter().position(|&p| p == alpha) {
                    silent.remove(at);
                    offenders.push(alpha);
                }
            }
        }
        match offenders.iter().min() {
            None => Ok(()),
            Some(&player) => Err(OrdersError::MissingTarget {
                player,
                capability: Capability::Eliminate,
            }),
        }
    }
}

/// A day vote: one or more tied candidates, letters only. The day
/// resolver draws a single target from these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    candidates: Vec<PlayerId>,
}

impl Vote {
    /// Parses a vote string such as `"D"` or, on a tie, `"AD"`.
    pub fn parse(raw: &str, board: &LivenessBoard) -> Result<Self, OrdersError> {
        let raw = raw.trim().to_uppercase();
        let mut candidates = Vec::new();
        for ch in raw.chars() {
            let Some(target) = PlayerId::from_letter(ch) else {
                return Err(OrdersError::InvalidCharacter { ch });
            };
            if target.index() >= board.len() {
                return Err(OrdersError::TargetOutOfRange {
                    letter: ch,
                    players: board.len(),
                });
            }
            if !board.is_alive(target) {
                return Err(OrdersError::TargetAlreadyRemoved { target });
            }
            candidates.push(target);
        }
        if candidates.is_empty() {
            return Err(OrdersError::EmptyVote);
        }
        Ok(Self { candidates })
    }

    /// The tied candidates in submission order.
    #[must_use]
    pub fn candidates(&self) -> &[PlayerId] {
        &self.candidates
    }

    /// The voted player: the sole candidate, or a uniform draw among a
    /// tie. A single candidate consumes nothing from the stream.
    /// `None` only for an empty candidate list, which `parse` never
    /// produces.
    pub fn draw(&self, rng: &mut PhaseRng) -> Option<PlayerId> {
        match self.candidates.as_slice() {
            [single] => Some(*single),
            tied => rng.choose(tied).copied(),
        }
    }
}

/// Whole-string checks shared by every order form: charset, target
/// range, and no letter naming a certainly-dead player anywhere.
fn check_wire(raw: &str, board: &LivenessBoard) -> Result<(), OrdersError> {
    for ch in raw.chars() {
        if ch == '-' || ch == '#' {
            continue;
        }
        let Some(target) = PlayerId::from_letter(ch) else {
            return Err(OrdersError::InvalidCharacter { ch });
        };
        if target.index() >= board.len() {
            return Err(OrdersError::TargetOutOfRange {
                letter: ch,
                players: board.len(),
            });
        }
        if !board.is_alive(target) {
            return Err(OrdersError::TargetAlreadyRemoved { target });
        }
    }
    Ok(())
}

fn split_blocks(raw: &str, players: usize) -> Result<Vec<&str>, OrdersError> {
    let blocks: Vec<&str> = raw.split('-').collect();
    if blocks.len() != players {
        return Err(OrdersError::BlockCount {
            expected: players,
            actual: blocks.len(),
        });
    }
    Ok(blocks)
}

fn letter_target(symbol: char, players: usize) -> Result<Option<PlayerId>, OrdersError> {
    if symbol == '#' {
        return Ok(None);
    }
    let Some(target) = PlayerId::from_letter(symbol) else {
        return Err(OrdersError::InvalidCharacter { ch: symbol });
    };
    if target.index() >= players {
        return Err(OrdersError::TargetOutOfRange {
            letter: symbol,
            players,
        });
    }
    Ok(Some(target))
}
