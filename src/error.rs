//! Error types for collapsar.
//!
//! All errors are strongly typed using thiserror, layered by the
//! stage that raises them: order validation, file storage, phase
//! resolution. This enables pattern matching on specific failure
//! conditions and keeps paradoxes clearly distinguished from
//! ordinary input faults.

use std::path::PathBuf;

use thiserror::Error;

use crate::orders::{Capability, UnsupportedOrder};
use crate::player::PlayerId;
use crate::role::Role;

/// Validation errors raised while parsing submitted orders.
#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("Expected {expected} order blocks, got {actual}")]
    BlockCount {
        expected: usize,
        actual: usize,
    },

    #[error("Order block for player {player} has {actual} characters, expected {expected}")]
    BlockLength {
        player: PlayerId,
        expected: usize,
        actual: usize,
    },

    #[error("Orders contain invalid character '{ch}'")]
    InvalidCharacter {
        ch: char,
    },

    #[error("Target letter '{letter}' is outside the {players}-player roster")]
    TargetOutOfRange {
        letter: char,
        players: usize,
    },

    #[error("Player {target} is already certainly removed")]
    TargetAlreadyRemoved {
        target: PlayerId,
    },

    #[error("Player {player} is dead and may only submit '#'")]
    DeadPlayerOrder {
        player: PlayerId,
    },

    #[error("Player {player} must name a target for {capability}")]
    MissingTarget {
        player: PlayerId,
        capability: Capability,
    },

    #[error("No vote candidates were submitted")]
    EmptyVote,

    #[error("No surviving world supports: {}", render_unsupported(.orders))]
    UnsupportedOrders {
        orders: Vec<UnsupportedOrder>,
    },
}

fn render_unsupported(orders: &[UnsupportedOrder]) -> String {
    let parts: Vec<String> = orders.iter().map(ToString::to_string).collect();
    parts.join("; ")
}

/// Errors raised by the snapshot and bond file store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to overwrite existing file {}", .path.display())]
    AlreadyExists {
        path: PathBuf,
    },

    #[error("Snapshot header is truncated: missing {line} line")]
    TruncatedHeader {
        line: &'static str,
    },

    #[error("Malformed header field '{field}': {detail}")]
    MalformedHeader {
        field: &'static str,
        detail: String,
    },

    #[error("Malformed world record at line {line}: {detail}")]
    MalformedRecord {
        line: usize,
        detail: String,
    },

    #[error("Malformed bond record '{record}': {detail}")]
    MalformedBond {
        record: String,
        detail: String,
    },

    #[error("World ordinal {ordinal} is outside the origin snapshot")]
    OrdinalOutOfRange {
        ordinal: u64,
    },

    #[error("Unknown role symbol '{symbol}'")]
    UnknownSymbol {
        symbol: char,
    },
}

/// Errors raised during phase resolution and collapse.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Paradox during {operation}: every candidate world has collapsed")]
    Paradox {
        operation: String,
    },

    #[error("World {ordinal} holds unexpected symbol '{symbol}' for player {player}")]
    UnexpectedSymbol {
        ordinal: u64,
        player: PlayerId,
        symbol: char,
    },

    #[error("World {ordinal} has no living {role} holder")]
    MissingHolder {
        ordinal: u64,
        role: Role,
    },
}

impl PhaseError {
    /// Creates a paradox error naming the operation where the last
    /// world collapsed.
    #[must_use]
    pub fn paradox(operation: impl Into<String>) -> Self {
        Self::Paradox {
            operation: operation.into(),
        }
    }
}

/// Top-level error type for collapsar.
///
/// This enum encompasses all possible errors that can occur
/// when driving a game through its phases.
#[derive(Debug, Error)]
pub enum CollapsarError {
    #[error("Orders error: {0}")]
    Orders(#[from] OrdersError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("Config error: {message}")]
    Config {
        message: String,
    },
}

impl CollapsarError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is an orders error.
    #[must_use]
    pub const fn is_orders(&self) -> bool {
        matches!(self, Self::Orders(_))
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a phase error.
    #[must_use]
    pub const fn is_phase(&self) -> bool {
        matches!(self, Self::Phase(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this error is a paradox, the fatal condition
    /// where no candidate world remains.
    #[must_use]
    pub const fn is_paradox(&self) -> bool {
        matches!(self, Self::Phase(PhaseError::Paradox { .. }))
    }

    /// Returns true if this error is an input fault the caller can
    /// fix and resubmit. Nothing is retried automatically; store and
    /// phase errors abort the transition with prior snapshots intact.
    #[must_use]
    pub const fn is_input_fault(&self) -> bool {
        matches!(self, Self::Orders(_))
    }
}

/// Result type alias for collapsar operations.
pub type CollapsarResult<T> = Result<T, CollapsarError>;
