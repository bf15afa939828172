//! Pairwise bonds and the matcher that forms and retires them.
//!
//! A bond links two players for as long as the binder who might have
//! created it could still exist. Each side of a bond carries the set
//! of players who nominated that endpoint, because any of them could
//! be the binder responsible; the closing pass shrinks those sets as
//! players are proven to not hold the binder symbol, and retires the
//! bond when an endpoint is certainly removed or a side's set runs
//! empty. The creation pass ranks nominated players and pairs them
//! greedily, evicting the oldest bond of any player already holding
//! two.
//!
//! Bond files carry one line per bond, oldest first:
//! `<two endpoint letters>-<creation round>-<side A letters>-<side B
//! letters>`.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::config::GameConfig;
use crate::error::StoreError;
use crate::orders::NightOrders;
use crate::player::{LivenessBoard, PlayerId};
use crate::role::Role;
use crate::store::create_new;
use crate::world::WorldSet;

/// A pairwise bond between two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bond {
    /// First endpoint.
    pub first: PlayerId,
    /// Second endpoint.
    pub second: PlayerId,
    /// Phase number the bond was created on.
    pub round: u32,
    /// Players who nominated the first endpoint and could still be
    /// the binder behind this side.
    pub first_candidates: Vec<PlayerId>,
    /// Same for the second endpoint.
    pub second_candidates: Vec<PlayerId>,
}

impl Bond {
    /// Returns true when the player is one of the endpoints.
    #[must_use]
    pub fn involves(&self, player: PlayerId) -> bool {
        self.first == player || self.second == player
    }

    /// Returns true when the bond links exactly this pair, in either
    /// order.
    #[must_use]
    pub fn links(&self, a: PlayerId, b: PlayerId) -> bool {
        (self.first == a && self.second == b) || (self.first == b && self.second == a)
    }

    /// The other endpoint.
    #[must_use]
    pub fn partner(&self, player: PlayerId) -> PlayerId {
        if self.first == player {
            self.second
        } else {
            self.first
        }
    }

    /// Renders the bond file line.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!(
            "{}{}-{}-{}-{}",
            self.first.letter(),
            self.second.letter(),
            self.round,
            letters(&self.first_candidates),
            letters(&self.second_candidates),
        )
    }

    /// Parses one bond file line.
    pub fn from_wire(line: &str, players: usize) -> Result<Self, StoreError> {
        let parts: Vec<&str> = line.split('-').collect();
        if parts.len() != 4 {
            return Err(malformed(line, "expected four dash-separated fields"));
        }
        let endpoints: Vec<char> = parts[0].chars().collect();
        if endpoints.len() != 2 {
            return Err(malformed(line, "expected exactly two endpoint letters"));
        }
        let first = parse_letter(line, endpoints[0], players)?;
        let second = parse_letter(line, endpoints[1], players)?;
        let round = parts[1]
            .parse::<u32>()
            .map_err(|_| malformed(line, "creation round is not a number"))?;
        Ok(Self {
            first,
            second,
            round,
            first_candidates: parse_letters(line, parts[2], players)?,
            second_candidates: parse_letters(line, parts[3], players)?,
        })
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

fn letters(players: &[PlayerId]) -> String {
    players.iter().map(|player| player.letter()).collect()
}

fn malformed(line: &str, detail: &str) -> StoreError {
    StoreError::MalformedBond {
        record: line.to_string(),
        detail: detail.to_string(),
    }
}

fn parse_letter(line: &str, letter: char, players: usize) -> Result<PlayerId, StoreError> {
    let Some(player) = PlayerId::from_letter(letter) else {
        return Err(malformed(line, "expected a player letter"));
    };
    if player.index() >= players {
        return Err(malformed(line, "player letter beyond the roster"));
    }
    Ok(player)
}

fn parse_letters(line: &str, field: &str, players: usize) -> Result<Vec<PlayerId>, StoreError> {
    field
        .chars()
        .map(|letter| parse_letter(line, letter, players))
        .collect()
}

/// Reads a bond file, oldest bond first.
pub fn read_bonds(path: &Path, players: usize) -> Result<Vec<Bond>, StoreError> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| Bond::from_wire(line, players))
        .collect()
}

/// Writes a bond file in creation order. Refuses to overwrite.
pub fn write_bonds(path: &Path, bonds: &[Bond]) -> Result<(), StoreError> {
    let mut file = BufWriter::new(create_new(path)?);
    for (index, bond) in bonds.iter().enumerate() {
        if index > 0 {
            write!(file, "\n{}", bond.to_wire())?;
        } else {
            write!(file, "{}", bond.to_wire())?;
        }
    }
    file.flush()?;
    Ok(())
}

/// Computes, per player, whether they could still be the binder:
/// identity unknown, not certainly removed, and holding the binder
/// symbol in at least one surviving world. A player whose identity
/// resolved to the binder no longer counts, since a revealed binder
/// sustains no bonds. Single forward pass with early exit.
#[must_use]
pub fn binder_candidates(worlds: &WorldSet, board: &LivenessBoard) -> Vec<bool> {
    let mut eligible: Vec<Option<bool>> = board
        .players()
        .map(|player| {
            if board.identity(player).is_none() && board.is_alive(player) {
                None
            } else {
                Some(false)
            }
        })
        .collect();
    let mut pending = eligible.iter().filter(|slot| slot.is_none()).count();
    for world in worlds {
        if pending == 0 {
            break;
        }
        if let Some(binder) = world.holder(Role::Binder) {
            if eligible[binder.index()].is_none() {
                eligible[binder.index()] = Some(true);
                pending -= 1;
            }
        }
    }
    eligible
        .into_iter()
        .map(|slot| slot.unwrap_or(false))
        .collect()
}

/// The closing pass: retires bonds whose endpoints are certainly
/// removed or whose candidate sides, filtered down to players who can
/// still be the binder, run empty. Survivors keep their filtered
/// sets; relative order is preserved. Returns (kept, closed).
#[must_use]
pub fn close_bonds(
    bonds: Vec<Bond>,
    board: &LivenessBoard,
    can_bind: &[bool],
) -> (Vec<Bond>, Vec<Bond>) {
    let mut kept = Vec::with_capacity(bonds.len());
    let mut closed = Vec::new();
    for mut bond in bonds {
        if !board.is_alive(bond.first) || !board.is_alive(bond.second) {
            debug!(bond = %bond, "Closing bond: an endpoint is certainly removed");
            closed.push(bond);
            continue;
        }
        bond.first_candidates
            .retain(|player| can_bind[player.index()]);
        bond.second_candidates
            .retain(|player| can_bind[player.index()]);
        if bond.first_candidates.is_empty() || bond.second_candidates.is_empty() {
            debug!(bond = %bond, "Closing bond: a side has no possible binder left");
            closed.push(bond);
            continue;
        }
        kept.push(bond);
    }
    (kept, closed)
}

/// What one creation pass did.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Bonds formed, in formation order.
    pub created: Vec<Bond>,
    /// Bonds evicted to make room for new ones.
    pub evicted: Vec<Bond>,
}

/// One nominated player awaiting a partner, with the sort keys that
/// rank them.
#[derive(Debug)]
struct Candidate {
    target: PlayerId,
    bonds: usize,
    nominators: Vec<PlayerId>,
    alive_worlds: u64,
    position: usize,
}

/// The creation pass. Ranks every living nominated player, then
/// greedily pairs them in rank order, skipping pairs that are already
/// bonded. Committing a pair evicts the oldest bond of any endpoint
/// already holding two. New bonds are appended to `bonds`; at most
/// two form per ordinary night, any number on the bootstrap night
/// (signalled by `worlds` being absent, as no snapshot is read then).
pub fn create_bonds(
    bonds: &mut Vec<Bond>,
    orders: &NightOrders,
    board: &LivenessBoard,
    worlds: Option<&WorldSet>,
    config: &GameConfig,
    round: u32,
) -> MatchOutcome {
    // Orders were parsed against the pre-phase board; nominators and
    // targets may both have died since.
    let mut nominators: Vec<Vec<PlayerId>> = vec![Vec::new(); board.len()];
    for (nominator, orders) in orders.living() {
        if !board.is_alive(nominator) {
            continue;
        }
        if let Some(target) = orders.bond {
            if board.is_alive(target) {
                nominators[target.index()].push(nominator);
            }
        }
    }
    let alive_worlds = match worlds {
        Some(worlds) => alive_world_counts(worlds, board.len()),
        None => vec![0; board.len()],
    };

    let mut pool: Vec<Candidate> = Vec::new();
    for target in board.players() {
        let named = std::mem::take(&mut nominators[target.index()]);
        if named.is_empty() || !board.is_alive(target) {
            continue;
        }
        pool.push(Candidate {
            target,
            bonds: bonds.iter().filter(|bond| bond.involves(target)).count(),
            nominators: named,
            alive_worlds: alive_worlds[target.index()],
            position: config.board_position(target),
        });
    }
    rank(&mut pool);
    debug!(
        nominated = pool.len(),
        round, "Ranked bond candidates for matching"
    );

    let cap = if worlds.is_some() { Some(2) } else { None };
    let mut outcome = MatchOutcome::default();
    while pool.len() > 1 && cap.map_or(true, |cap| outcome.created.len() < cap) {
        let Some((first_at, second_at)) = next_pair(&pool, bonds) else {
            debug!("Every remaining candidate pair is already bonded");
            break;
        };
        let mut resort = false;
        for at in [first_at, second_at] {
            if pool[at].bonds < 2 {
                continue;
            }
            if let Some(evicted) = evict_oldest(bonds, pool[at].target) {
                let partner = evicted.partner(pool[at].target);
                pool[at].bonds -= 1;
                if let Some(entry) = pool.iter_mut().find(|entry| entry.target == partner) {
                    entry.bonds = entry.bonds.saturating_sub(1);
                }
                debug!(bond = %evicted, "Evicting oldest bond to make room");
                outcome.evicted.push(evicted);
                resort = true;
            }
        }
        let second = pool.remove(second_at);
        let first = pool.remove(first_at);
        let bond = Bond {
            first: first.target,
            second: second.target,
            round,
            first_candidates: first.nominators,
            second_candidates: second.nominators,
        };
        debug!(bond = %bond, "Creating bond");
        bonds.push(bond.clone());
        outcome.created.push(bond);
        if resort {
            rank(&mut pool);
        }
    }
    outcome
}

fn rank(pool: &mut [Candidate]) {
    pool.sort_by(|a, b| {
        a.bonds
            .cmp(&b.bonds)
            .then_with(|| b.nominators.len().cmp(&a.nominators.len()))
            .then_with(|| a.alive_worlds.cmp(&b.alive_worlds))
            .then_with(|| a.position.cmp(&b.position))
    });
}

fn next_pair(pool: &[Candidate], bonds: &[Bond]) -> Option<(usize, usize)> {
    for first in 0..pool.len() {
        for second in first + 1..pool.len() {
            let taken = bonds
                .iter()
                .any(|bond| bond.links(pool[first].target, pool[second].target));
            if !taken {
                return Some((first, second));
            }
        }
    }
    None
}

fn evict_oldest(bonds: &mut Vec<Bond>, endpoint: PlayerId) -> Option<Bond> {
    let at = bonds.iter().position(|bond| bond.involves(endpoint))?;
    Some(bonds.remove(at))
}

fn alive_world_counts(worlds: &WorldSet, players: usize) -> Vec<u64> {
    let mut counts = vec![0_u64; players];
    for world in worlds {
        for (index, role) in world.roles().iter().enumerate() {
            if role.is_alive() {
                counts[index] += 1;
            }
        }
    }
    counts
}
