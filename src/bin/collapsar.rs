//! Command-line driver for collapsar games.
//!
//! Thin wiring only, no game logic: each subcommand maps to one
//! session operation and prints the phase outcome as JSON on stdout
//! for external report generators. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use collapsar::{CapabilityFlags, CollapsarError, GameConfig, OrdersError, PlayerId, Session};

#[derive(Parser, Debug)]
#[command(name = "collapsar")]
#[command(about = "Possible-world engine for hidden-role games", version)]
struct Cli {
    /// Game directory holding game.json and the phase files.
    #[arg(short, long, default_value = "game", global = true)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a game: write game.json and the origin snapshot.
    Setup {
        /// Number of players.
        players: usize,
        /// Cabal size.
        cabal: usize,
        /// Seed for the game's deterministic random source.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Deal the seer capability.
        #[arg(long)]
        seer: bool,
        /// Deal the binder capability.
        #[arg(long)]
        binder: bool,
        /// Deal the watcher capability.
        #[arg(long)]
        watcher: bool,
        /// Deal the warden capability.
        #[arg(long)]
        warden: bool,
    },
    /// Resolve one night from an order string.
    Night {
        /// Night number; 0 is the bootstrap night.
        night: u32,
        /// Order blocks in seat order, separated by `-`.
        orders: String,
    },
    /// Resolve one day from a vote.
    Day {
        /// Day number, starting at 1.
        day: u32,
        /// Candidate letters; ties are drawn at random.
        vote: String,
    },
    /// Check one player's prospective night orders.
    Check {
        /// Night number the orders are meant for.
        night: u32,
        /// The ordering player's seat letter.
        player: char,
        /// The player's order block.
        block: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CollapsarError> {
    match cli.command {
        Command::Setup {
            players,
            cabal,
            seed,
            seer,
            binder,
            watcher,
            warden,
        } => {
            let flags = CapabilityFlags {
                seer,
                binder,
                watcher,
                warden,
            };
            let config = GameConfig::create(players, cabal, flags, seed)?;
            let session = Session::create(cli.dir, config)?;
            print_json(session.config())
        }
        Command::Night { night, orders } => {
            let mut session = Session::open(cli.dir)?;
            let outcome = session.night(night, &orders)?;
            print_json(&outcome)
        }
        Command::Day { day, vote } => {
            let mut session = Session::open(cli.dir)?;
            let outcome = session.day(day, &vote)?;
            print_json(&outcome)
        }
        Command::Check {
            night,
            player,
            block,
        } => {
            let player = PlayerId::from_letter(player)
                .ok_or(OrdersError::InvalidCharacter { ch: player })?;
            let mut session = Session::open(cli.dir)?;
            session.check_orders(night, player, &block)?;
            println!("ok");
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CollapsarError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| CollapsarError::config(format!("cannot render the report: {err}")))?;
    println!("{body}");
    Ok(())
}
