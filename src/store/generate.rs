//! Origin snapshot generation.
//!
//! The origin enumerates every ordered assignment of the assigned
//! roles (the cabal sub-symbols, then each active capability) to
//! distinct seats; everyone else is a citizen. For `n` players and
//! `k` assigned roles that is `n!/(n-k)!` worlds, streamed straight
//! to disk in lexicographic order of the seat choices so the set is
//! never materialized in memory.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::GameConfig;
use crate::error::StoreError;
use crate::player::LivenessBoard;
use crate::role::Role;

use super::{codec, create_new};

/// Writes the origin snapshot for a game, returning the world count.
/// Fails if the path already exists.
pub fn generate(config: &GameConfig, path: &Path) -> Result<u64, StoreError> {
    let slots = role_slots(config);
    let count = permutation_count(config.players, slots.len());
    let width = codec::width_for_count(count);

    let mut out = BufWriter::new(create_new(path)?);
    writeln!(out, "{}", codec::encode_setup(config.initial_setup()))?;
    writeln!(out, "{}", LivenessBoard::new(config.players).to_wire())?;
    writeln!(out, "{count}")?;
    writeln!(out)?;

    let mut seats = KPermutations::new(config.players, slots.len());
    let mut roles = vec![Role::Citizen; config.players];
    let mut buffer = String::new();
    let mut ordinal: u64 = 0;
    while let Some(perm) = seats.advance() {
        for role in &mut roles {
            *role = Role::Citizen;
        }
        for (slot, &seat) in perm.iter().enumerate() {
            roles[seat] = slots[slot];
        }
        buffer.clear();
        codec::render_parts(&mut buffer, ordinal, &roles, width);
        if ordinal > 0 {
            out.write_all(b"\n")?;
        }
        out.write_all(buffer.as_bytes())?;
        ordinal += 1;
    }
    out.flush()?;

    debug_assert_eq!(ordinal, count);
    Ok(count)
}

/// The roles the origin assigns, in enumeration slot order.
fn role_slots(config: &GameConfig) -> Vec<Role> {
    let cabal = [Role::CabalAlpha, Role::CabalBeta, Role::CabalGamma];
    let mut slots: Vec<Role> = cabal[..config.cabal.min(cabal.len())].to_vec();
    if config.flags.seer {
        slots.push(Role::Seer);
    }
    if config.flags.binder {
        slots.push(Role::Binder);
    }
    if config.flags.watcher {
        slots.push(Role::Watcher);
    }
    if config.flags.warden {
        slots.push(Role::Warden);
    }
    slots
}

fn permutation_count(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    (0..k).map(|i| (n - i) as u64).product()
}

/// Lexicographic k-permutations of `0..n`, advanced in place.
struct KPermutations {
    n: usize,
    k: usize,
    perm: Vec<usize>,
    used: Vec<bool>,
    fresh: bool,
    exhausted: bool,
}

impl KPermutations {
    fn new(n: usize, k: usize) -> Self {
        let exhausted = k > n;
        let perm: Vec<usize> = (0..k.min(n)).collect();
        let mut used = vec![false; n];
        for &seat in &perm {
            used[seat] = true;
        }
        Self {
            n,
            k,
            perm,
            used,
            fresh: true,
            exhausted,
        }
    }

    /// Steps to the next permutation, returning it, or `None` once
    /// every permutation has been produced.
    fn advance(&mut self) -> Option<&[usize]> {
        if self.exhausted {
            return None;
        }
        if self.fresh {
            self.fresh = false;
            return Some(&self.perm);
        }
        let mut position = self.k;
        loop {
            if position == 0 {
                self.exhausted = true;
                return None;
            }
            position -= 1;
            let current = self.perm[position];
            self.used[current] = false;
            let Some(next) = (current + 1..self.n).find(|&seat| !self.used[seat]) else {
                continue;
            };
            self.perm[position] = next;
            self.used[next] = true;
            // Positions to the right restart at the smallest unused
            // seats in increasing order.
            let mut seat = 0;
            for fill in position + 1..self.k {
                while self.used[seat] {
                    seat += 1;
                }
                self.perm[fill] = seat;
                self.used[seat] = true;
            }
            return Some(&self.perm);
        }
    }
}
