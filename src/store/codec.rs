//! Text codec for snapshot files.
//!
//! The format is positional and bit-exact:
//!
//! ```text
//! <players>-<cabal>-<flags>     setup line, flags in seer/binder/watcher/warden order
//! <identity><status>...         liveness line, two characters per seat
//! <count>                       surviving world count
//! <orders>                      order string that produced this snapshot, may be empty
//! <ordinal>-<symbols>           one line per world, no newline after the last
//! ```
//!
//! Ordinals are zero-padded to the digit width implied by the count
//! at generation time; a filtered snapshot keeps the origin's width,
//! so the width is carried through the pipeline rather than recomputed
//! from the shrinking count.

use crate::config::{CapabilityFlags, Setup};
use crate::error::StoreError;
use crate::role::Role;
use crate::world::World;

/// Byte layout of the origin snapshot's record block: where records
/// start, how long one record line is including its newline, and how
/// many digits the zero-padded ordinal takes. Computed once when the
/// origin pin is established, then used for every O(1) lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordGeometry {
    /// Offset of the first record's first byte.
    pub records_start: u64,
    /// Record line length plus one for the newline.
    pub record_len: u64,
    /// Zero-padded ordinal width.
    pub ordinal_digits: usize,
}

impl RecordGeometry {
    /// Byte offset of one player's symbol within one world's record.
    #[must_use]
    pub const fn symbol_offset(&self, ordinal: u64, player_index: usize) -> u64 {
        self.records_start
            + ordinal * self.record_len
            + self.ordinal_digits as u64
            + 1
            + player_index as u64
    }
}

/// Ordinal digit width for a freshly generated set of `count` worlds.
#[must_use]
pub fn width_for_count(count: u64) -> usize {
    let mut largest = count.saturating_sub(1);
    let mut digits = 1;
    while largest >= 10 {
        largest /= 10;
        digits += 1;
    }
    digits
}

/// Renders the setup line.
#[must_use]
pub fn encode_setup(setup: Setup) -> String {
    format!(
        "{}-{}-{}",
        setup.players_left,
        setup.cabal_left,
        setup.flags.to_wire()
    )
}

/// Parses the setup line.
pub fn parse_setup(line: &str) -> Result<Setup, StoreError> {
    let malformed = |detail: String| StoreError::MalformedHeader {
        field: "setup",
        detail,
    };
    let parts: Vec<&str> = line.split('-').collect();
    if parts.len() != 3 {
        return Err(malformed(format!(
            "expected three '-' separated fields, got '{line}'"
        )));
    }
    let players_left: usize = parts[0]
        .parse()
        .map_err(|_| malformed(format!("bad player count '{}'", parts[0])))?;
    let cabal_left: usize = parts[1]
        .parse()
        .map_err(|_| malformed(format!("bad cabal count '{}'", parts[1])))?;
    let flags = CapabilityFlags::from_wire(parts[2])?;
    Ok(Setup {
        players_left,
        cabal_left,
        flags,
    })
}

/// Renders one world record at the given ordinal width.
#[must_use]
pub fn encode_record(world: &World, width: usize) -> String {
    let mut line = String::with_capacity(width + 1 + world.players());
    render_record(&mut line, world, width);
    line
}

/// Renders one world record into a reusable buffer.
pub fn render_record(buffer: &mut String, world: &World, width: usize) {
    render_parts(buffer, world.ordinal(), world.roles(), width);
}

/// Record rendering on bare parts, for writers that never build a
/// `World` value per record.
pub(crate) fn render_parts(buffer: &mut String, ordinal: u64, roles: &[Role], width: usize) {
    use std::fmt::Write;
    // Infallible for String targets.
    let _ = write!(buffer, "{ordinal:0width$}");
    buffer.push('-');
    for role in roles {
        buffer.push(role.as_char());
    }
}

/// Parses one world record line. Returns the world and the ordinal
/// width the line was padded to.
pub fn parse_record(
    line: &str,
    players: usize,
    line_no: usize,
) -> Result<(World, usize), StoreError> {
    let malformed = |detail: String| StoreError::MalformedRecord {
        line: line_no,
        detail,
    };
    let Some(width) = line.find('-') else {
        return Err(malformed(format!("missing '-' separator in '{line}'")));
    };
    let ordinal: u64 = line[..width]
        .parse()
        .map_err(|_| malformed(format!("bad ordinal '{}'", &line[..width])))?;
    let symbols = &line[width + 1..];
    let mut roles = Vec::with_capacity(players);
    for symbol in symbols.chars() {
        let role = Role::from_char(symbol)
            .ok_or_else(|| malformed(format!("unknown role symbol '{symbol}'")))?;
        roles.push(role);
    }
    if roles.len() != players {
        return Err(malformed(format!(
            "expected {players} symbols, got {}",
            roles.len()
        )));
    }
    Ok((World::new(ordinal, roles), width))
}
