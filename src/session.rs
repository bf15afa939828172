//! Game sessions.
//!
//! A session owns one game directory and everything needed to run a
//! phase against it: the immutable config, the phase-indexed RNG, and
//! the lazily opened origin pin. Phase operations borrow the session
//! mutably for their whole run; nothing about a game lives in module
//! state. Dropping the session releases the origin mapping.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::GameConfig;
use crate::error::{CollapsarResult, StoreError};
use crate::phase::{self, PhaseId, PhaseOutcome};
use crate::player::PlayerId;
use crate::rng::PhaseRng;
use crate::store::{self, OriginPin};

/// The game config file inside a game directory.
pub const CONFIG_FILE: &str = "game.json";

/// The terminal snapshot written when the game ends.
pub const FINAL_WORLDS_FILE: &str = "worlds-final.txt";

/// The bootstrap night's order record. The origin snapshot is written
/// before that night runs, so its orders are preserved separately for
/// the report generators.
pub const BOOTSTRAP_ORDERS_FILE: &str = "orders-D1.txt";

/// One game directory and the state for running phases against it.
#[derive(Debug)]
pub struct Session {
    dir: PathBuf,
    config: GameConfig,
    origin: Option<OriginPin>,
}

impl Session {
    /// Creates a game: writes `game.json` and generates the origin
    /// snapshot. Fails if either file already exists.
    pub fn create(dir: impl Into<PathBuf>, config: GameConfig) -> CollapsarResult<Self> {
        let session = Self {
            dir: dir.into(),
            config,
            origin: None,
        };
        session.config.save(&session.file(CONFIG_FILE))?;
        let worlds = store::generate(&session.config, &session.origin_path())?;
        info!(
            players = session.config.players,
            cabal = session.config.cabal,
            worlds,
            dir = %session.dir.display(),
            "Game created"
        );
        Ok(session)
    }

    /// Opens an existing game directory by loading its `game.json`.
    pub fn open(dir: impl Into<PathBuf>) -> CollapsarResult<Self> {
        let dir = dir.into();
        let config = GameConfig::load(&dir.join(CONFIG_FILE))?;
        Ok(Self {
            dir,
            config,
            origin: None,
        })
    }

    /// The game directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The immutable game parameters.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// A file path inside the game directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Path of the origin snapshot.
    #[must_use]
    pub fn origin_path(&self) -> PathBuf {
        self.file(&PhaseId::Night(0).worlds_in())
    }

    /// The origin pin, mapped on first use and held for the rest of
    /// the session.
    pub fn origin(&mut self) -> Result<&OriginPin, StoreError> {
        if self.origin.is_none() {
            self.origin = Some(OriginPin::open(&self.origin_path())?);
        }
        match &self.origin {
            Some(pin) => Ok(pin),
            None => unreachable!("pin opened above"),
        }
    }

    /// The random source for one phase of this game.
    #[must_use]
    pub fn rng(&self, phase: PhaseId) -> PhaseRng {
        PhaseRng::for_phase(self.config.seed, phase)
    }

    /// Runs night `night` with the given order string. Night 0 is the
    /// bootstrap night and resolves bond nominations only.
    pub fn night(&mut self, night: u32, orders: &str) -> CollapsarResult<PhaseOutcome> {
        phase::night::run(self, night, orders)
    }

    /// Runs day `day` (numbered from 1) with the given vote string.
    pub fn day(&mut self, day: u32, vote: &str) -> CollapsarResult<PhaseOutcome> {
        phase::day::run(self, day, vote)
    }

    /// Checks one player's prospective orders for night `night`
    /// without touching any state.
    pub fn check_orders(&mut self, night: u32, player: PlayerId, block: &str) -> CollapsarResult<()> {
        phase::check::run(self, night, player, block)
    }
}
