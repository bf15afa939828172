//! Snapshot persistence.
//!
//! Each phase reads one snapshot and writes the next: `worlds-D<n>.txt`
//! enters day `n`, `worlds-N<n>.txt` enters night `n`, and
//! `worlds-final.txt` holds the bare surviving records once the game
//! ends. Snapshots are write-once: a path that already exists is an
//! error, never an overwrite, so a failed transition can be re-run
//! after fixing its input with no state lost.
//!
//! Reading streams records one line at a time; only the callers that
//! need the whole set materialize it. Generation streams too, because
//! the initial set (every ordered assignment of the special roles) can
//! run to tens of millions of worlds.

pub mod codec;
mod generate;
mod origin;

pub use codec::{width_for_count, RecordGeometry};
pub use generate::generate;
pub use origin::OriginPin;

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::config::Setup;
use crate::error::StoreError;
use crate::player::LivenessBoard;
use crate::world::{World, WorldSet};

/// Opens a file for writing, failing if it already exists.
pub(crate) fn create_new(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => StoreError::Io(e),
        })
}

/// The four header lines of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Setup line: surviving players, remaining cabal, active flags.
    pub setup: Setup,
    /// The liveness board at the time the snapshot was written.
    pub board: LivenessBoard,
    /// Surviving world count.
    pub count: u64,
    /// The raw order string that produced this snapshot. Empty for
    /// the origin and for day outputs.
    pub actions: String,
}

/// A fully materialized snapshot: header state plus every surviving
/// world, with the ordinal width carried from generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub setup: Setup,
    pub board: LivenessBoard,
    pub actions: String,
    pub width: usize,
    pub worlds: WorldSet,
}

impl Snapshot {
    /// Reads and materializes a whole snapshot.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let mut reader = SnapshotReader::open(path)?;
        let mut worlds = Vec::with_capacity(reader.header().count as usize);
        let mut last_ordinal = None;
        while let Some(world) = reader.next() {
            let world = world?;
            if last_ordinal.is_some_and(|last| world.ordinal() <= last) {
                return Err(StoreError::MalformedRecord {
                    line: reader.line_no,
                    detail: format!("ordinal {} out of order", world.ordinal()),
                });
            }
            last_ordinal = Some(world.ordinal());
            worlds.push(world);
        }
        if worlds.len() as u64 != reader.header().count {
            return Err(StoreError::MalformedHeader {
                field: "count",
                detail: format!(
                    "header says {} worlds, file has {}",
                    reader.header().count,
                    worlds.len()
                ),
            });
        }
        let width = reader.ordinal_width();
        let header = reader.into_header();
        Ok(Self {
            setup: header.setup,
            board: header.board,
            actions: header.actions,
            width,
            worlds: WorldSet::from_worlds(worlds),
        })
    }

    /// Reads only the four header lines.
    pub fn read_header(path: &Path) -> Result<SnapshotHeader, StoreError> {
        Ok(SnapshotReader::open(path)?.into_header())
    }

    /// Writes the snapshot. Fails if the path already exists.
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let mut out = BufWriter::new(create_new(path)?);
        writeln!(out, "{}", codec::encode_setup(self.setup))?;
        writeln!(out, "{}", self.board.to_wire())?;
        writeln!(out, "{}", self.worlds.len())?;
        writeln!(out, "{}", self.actions)?;
        self.write_records(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Dumps the bare surviving records, no header: the terminal
    /// `worlds-final.txt` form.
    pub fn write_final(&self, path: &Path) -> Result<(), StoreError> {
        let mut out = BufWriter::new(create_new(path)?);
        self.write_records(&mut out)?;
        out.flush()?;
        Ok(())
    }

    fn write_records(&self, out: &mut BufWriter<File>) -> Result<(), StoreError> {
        let mut buffer = String::new();
        let mut first = true;
        for world in &self.worlds {
            buffer.clear();
            codec::render_record(&mut buffer, world, self.width);
            if first {
                first = false;
            } else {
                out.write_all(b"\n")?;
            }
            out.write_all(buffer.as_bytes())?;
        }
        Ok(())
    }
}

/// Streaming snapshot reader: parses the header eagerly, then yields
/// one world per record line.
pub struct SnapshotReader {
    lines: Lines<BufReader<File>>,
    header: SnapshotHeader,
    width: Option<usize>,
    players: usize,
    line_no: usize,
}

impl SnapshotReader {
    /// Opens a snapshot and reads its header.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(StoreError::Io)?;
        let mut lines = BufReader::new(file).lines();

        let setup = codec::parse_setup(&header_line(&mut lines, "setup")?)?;
        let liveness = header_line(&mut lines, "liveness")?;
        let symbols = liveness.chars().count();
        if symbols % 2 != 0 {
            return Err(StoreError::MalformedHeader {
                field: "liveness",
                detail: format!("odd length {symbols}"),
            });
        }
        let board = LivenessBoard::from_wire(&liveness, symbols / 2)?;
        let count_line = header_line(&mut lines, "count")?;
        let count: u64 = count_line.parse().map_err(|_| StoreError::MalformedHeader {
            field: "count",
            detail: format!("bad world count '{count_line}'"),
        })?;
        let actions = header_line(&mut lines, "orders")?;

        let players = board.len();
        Ok(Self {
            lines,
            header: SnapshotHeader {
                setup,
                board,
                count,
                actions,
            },
            width: None,
            players,
            line_no: 4,
        })
    }

    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Consumes the reader, keeping only the header.
    #[must_use]
    pub fn into_header(self) -> SnapshotHeader {
        self.header
    }

    /// Ordinal width observed on the first record, or the width the
    /// header count implies when no record has been read.
    #[must_use]
    pub fn ordinal_width(&self) -> usize {
        self.width
            .unwrap_or_else(|| codec::width_for_count(self.header.count))
    }
}

impl Iterator for SnapshotReader {
    type Item = Result<World, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        self.line_no += 1;
        match codec::parse_record(&line, self.players, self.line_no) {
            Ok((world, width)) => {
                if self.width.is_none() {
                    self.width = Some(width);
                }
                Some(Ok(world))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

fn header_line(
    lines: &mut Lines<BufReader<File>>,
    name: &'static str,
) -> Result<String, StoreError> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(StoreError::TruncatedHeader { line: name }),
    }
}
