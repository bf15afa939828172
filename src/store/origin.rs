//! The origin pin: an O(1) view into the first snapshot.
//!
//! Collapse needs a player's role at a world's birth long after later
//! snapshots stopped carrying that world. The origin file is immutable
//! once written and every record has the same byte length, so a role
//! lookup is pure offset arithmetic over a memory map; nothing is
//! parsed ahead of time beyond the header and one record to fix the
//! geometry.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::config::Setup;
use crate::error::StoreError;
use crate::player::{LivenessBoard, PlayerId};
use crate::role::Role;

use super::codec::{self, RecordGeometry};

/// Memory-mapped origin snapshot with validated record geometry.
#[derive(Debug)]
pub struct OriginPin {
    map: Mmap,
    geometry: RecordGeometry,
    players: usize,
    count: u64,
}

impl OriginPin {
    /// Maps the origin file and fixes its record geometry. The whole
    /// record block is length-checked here, so later lookups can index
    /// without re-validating.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(StoreError::Io)?;
        let map = unsafe { Mmap::map(&file) }.map_err(StoreError::Io)?;

        let mut offset = 0usize;
        let setup_line = take_line(&map, &mut offset, "setup")?;
        let _setup: Setup = codec::parse_setup(setup_line)?;
        let liveness = take_line(&map, &mut offset, "liveness")?;
        if liveness.len() % 2 != 0 {
            return Err(StoreError::MalformedHeader {
                field: "liveness",
                detail: format!("odd length {}", liveness.len()),
            });
        }
        let players = liveness.len() / 2;
        LivenessBoard::from_wire(liveness, players)?;
        let count_line = take_line(&map, &mut offset, "count")?;
        let count: u64 = count_line.parse().map_err(|_| StoreError::MalformedHeader {
            field: "count",
            detail: format!("bad world count '{count_line}'"),
        })?;
        take_line(&map, &mut offset, "orders")?;

        if count == 0 {
            return Err(StoreError::MalformedHeader {
                field: "count",
                detail: "origin snapshot has no worlds".to_string(),
            });
        }

        let records_start = offset as u64;
        let first = &map[offset..];
        let first_len = first
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(first.len());
        let first_line = bytes_as_line(&first[..first_len], 5)?;
        let Some(ordinal_digits) = first_line.find('-') else {
            return Err(StoreError::MalformedRecord {
                line: 5,
                detail: format!("missing '-' separator in '{first_line}'"),
            });
        };
        if first_len != ordinal_digits + 1 + players {
            return Err(StoreError::MalformedRecord {
                line: 5,
                detail: format!(
                    "record is {first_len} bytes, expected {} for {players} players",
                    ordinal_digits + 1 + players
                ),
            });
        }
        let geometry = RecordGeometry {
            records_start,
            record_len: first_len as u64 + 1,
            ordinal_digits,
        };

        let expected = records_start + count * geometry.record_len - 1;
        if map.len() as u64 != expected {
            return Err(StoreError::MalformedHeader {
                field: "count",
                detail: format!(
                    "{count} records of {} bytes need {expected} bytes, file has {}",
                    geometry.record_len,
                    map.len()
                ),
            });
        }

        Ok(Self {
            map,
            geometry,
            players,
            count,
        })
    }

    /// Seats in the origin.
    #[must_use]
    pub const fn players(&self) -> usize {
        self.players
    }

    /// Worlds in the origin.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The validated byte layout of the record block.
    #[must_use]
    pub const fn geometry(&self) -> RecordGeometry {
        self.geometry
    }

    /// The role a player was born with in one origin world. A single
    /// byte read at a computed offset.
    pub fn original_role(&self, player: PlayerId, ordinal: u64) -> Result<Role, StoreError> {
        if ordinal >= self.count {
            return Err(StoreError::OrdinalOutOfRange { ordinal });
        }
        debug_assert!(player.index() < self.players);
        let at = self.geometry.symbol_offset(ordinal, player.index()) as usize;
        let symbol = self.map[at] as char;
        Role::from_char(symbol).ok_or(StoreError::UnknownSymbol { symbol })
    }
}

fn take_line<'a>(
    map: &'a Mmap,
    offset: &mut usize,
    name: &'static str,
) -> Result<&'a str, StoreError> {
    let rest = &map[*offset..];
    let Some(end) = rest.iter().position(|&b| b == b'\n') else {
        return Err(StoreError::TruncatedHeader { line: name });
    };
    let line = std::str::from_utf8(&rest[..end]).map_err(|_| StoreError::MalformedHeader {
        field: name,
        detail: "non-ASCII bytes".to_string(),
    })?;
    *offset += end + 1;
    Ok(line)
}

fn bytes_as_line(bytes: &[u8], line: usize) -> Result<&str, StoreError> {
    std::str::from_utf8(bytes).map_err(|_| StoreError::MalformedRecord {
        line,
        detail: "non-ASCII bytes".to_string(),
    })
}
