//! # Collapsar
//!
//! A possible-world engine for hidden-role deduction games. Instead
//! of dealing one secret role assignment, a game starts as the set of
//! every assignment consistent with the public setup, and each night
//! elimination or day vote is applied to all of them at once. Worlds
//! that contradict an outcome collapse; a player removed in every
//! surviving world is flipped to one ground truth drawn among them;
//! and the game ends when one side controls whatever is left.
//!
//! The engine is file-backed and append-only: each phase reads the
//! previous world snapshot, never overwrites an existing file, and
//! writes the next snapshot plus its bond ledger. Replaying the same
//! seed and orders reproduces the same files byte for byte.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use collapsar::{CapabilityFlags, GameConfig, Session};
//!
//! # fn main() -> collapsar::CollapsarResult<()> {
//! let flags = CapabilityFlags {
//!     seer: true,
//!     binder: true,
//!     watcher: false,
//!     warden: false,
//! };
//! let config = GameConfig::create(7, 2, flags, 42)?;
//! let mut session = Session::create(Path::new("game"), config)?;
//!
//! // The bootstrap night matches bond nominations; after that the
//! // phases alternate, one elimination per night, one vote per day.
//! session.night(0, "B-C-#-#-#-#-#")?;
//! let outcome = session.day(1, "D")?;
//! println!("{} worlds survive", outcome.worlds_after);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core world-set types
pub mod config;
pub mod error;
pub mod player;
pub mod role;
pub mod world;

// The engine: storage, orders, phase resolution
pub mod bond;
pub mod collapse;
pub mod orders;
pub mod phase;
pub mod rng;
pub mod session;
pub mod store;
pub mod victory;

// Re-export the types a driver touches at the crate root
pub use collapse::{Promotion, Reveal};
pub use config::{CapabilityFlags, GameConfig, Setup};
pub use error::{CollapsarError, CollapsarResult, OrdersError, PhaseError, StoreError};
pub use orders::{Capability, NightOrders, PlayerOrders, UnsupportedOrder, Vote};
pub use phase::{CollapseTally, PhaseId, PhaseOutcome};
pub use player::{LivenessBoard, PlayerId, PlayerStatus, RemovalCause};
pub use role::Role;
pub use session::{Session, BOOTSTRAP_ORDERS_FILE, CONFIG_FILE, FINAL_WORLDS_FILE};
pub use victory::Victory;
pub use world::{World, WorldSet};
