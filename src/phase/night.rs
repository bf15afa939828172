//! Night resolution.
//!
//! An ordinary night applies the cabal's elimination to every
//! surviving world at once. Each world names its own eliminator (the
//! player holding the alpha symbol there) and reads that player's
//! order slots, so one order string resolves differently across the
//! set. The target's symbol in the world decides its fate: a fellow
//! cabal member collapses the world outright, a warden interception
//! collapses it unless the seer died anyway, and a binder target
//! parks the world on a side set that survives only if no other world
//! line saw a non-binder die.
//!
//! The bootstrap night `N0` runs before any elimination: it matches
//! bond nominations, records its orders for the next morning's
//! reports, and leaves the world set untouched.

use std::io::Write;

use tracing::{info, warn};

use crate::bond;
use crate::collapse;
use crate::config::CapabilityFlags;
use crate::error::{CollapsarResult, OrdersError, PhaseError, StoreError};
use crate::orders::{Capability, NightOrders};
use crate::phase::{self, CollapseTally, PhaseId, PhaseOutcome};
use crate::role::Role;
use crate::session::{Session, BOOTSTRAP_ORDERS_FILE, FINAL_WORLDS_FILE};
use crate::store::{self, Snapshot};
use crate::victory;
use crate::world::WorldSet;

/// Runs one night against the game directory.
pub fn run(session: &mut Session, night: u32, orders: &str) -> CollapsarResult<PhaseOutcome> {
    let phase = PhaseId::Night(night);
    // The bootstrap night has no world output and no bond input;
    // every later night has both.
    match (phase.worlds_out(), phase.bonds_in()) {
        (Some(worlds_out), Some(bonds_in)) => {
            ordinary(session, phase, &worlds_out, &bonds_in, orders)
        }
        _ => bootstrap(session, phase, orders),
    }
}

fn bootstrap(session: &mut Session, phase: PhaseId, raw: &str) -> CollapsarResult<PhaseOutcome> {
    let orders_out = session.file(BOOTSTRAP_ORDERS_FILE);
    phase::refuse_existing(&orders_out)?;

    let header = Snapshot::read_header(&session.file(&phase.worlds_in()))?;
    let orders = NightOrders::parse_bootstrap(raw, &header.board)?;

    // Nominations are accepted either way, but the bond ledger only
    // exists while the binder capability is in the game.
    let (bonds_created, bonds_closed) = if header.setup.flags.binder {
        let bonds_out = session.file(&phase.bonds_out());
        phase::refuse_existing(&bonds_out)?;
        let mut bonds = Vec::new();
        let outcome = bond::create_bonds(
            &mut bonds,
            &orders,
            &header.board,
            None,
            session.config(),
            phase.number(),
        );
        bond::write_bonds(&bonds_out, &bonds)?;
        (outcome.created.len(), outcome.evicted.len())
    } else {
        (0, 0)
    };

    let mut record = store::create_new(&orders_out)?;
    record
        .write_all(orders.raw().as_bytes())
        .map_err(StoreError::Io)?;

    info!(
        phase = %phase,
        bonds = bonds_created,
        "Bootstrap night matched bond nominations"
    );
    Ok(PhaseOutcome {
        phase,
        worlds_before: header.count,
        worlds_after: header.count,
        tally: CollapseTally::default(),
        reveals: Vec::new(),
        promotions: Vec::new(),
        setup: header.setup,
        liveness: header.board.to_wire(),
        bonds_closed,
        bonds_created,
        victory: None,
    })
}

fn ordinary(
    session: &mut Session,
    phase: PhaseId,
    worlds_out: &str,
    bonds_in: &str,
    raw: &str,
) -> CollapsarResult<PhaseOutcome> {
    let worlds_out = session.file(worlds_out);
    let bonds_out = session.file(&phase.bonds_out());
    phase::refuse_existing(&worlds_out)?;

    let snapshot = Snapshot::read(&session.file(&phase.worlds_in()))?;
    let Snapshot {
        setup,
        mut board,
        width,
        worlds,
        ..
    } = snapshot;
    if setup.flags.binder {
        phase::refuse_existing(&bonds_out)?;
    }

    let orders = NightOrders::parse(raw, setup.flags, &board)?;
    orders.validate_targets(&worlds)?;
    orders.require_eliminators(&worlds)?;

    let worlds_before = worlds.len() as u64;
    let Resolution {
        mut main,
        side,
        mut tally,
    } = resolve(worlds, &orders, setup.flags)?;

    if main.is_empty() && !side.is_empty() {
        warn!(
            parked = side.len(),
            "Elimination found the binder in every world line"
        );
        main = side;
    } else {
        tally.binder_immortality += side.len() as u64;
    }
    if main.is_empty() {
        return Err(PhaseError::paradox("night resolution").into());
    }

    let mut rng = session.rng(phase);
    let (reveals, promotions) = {
        let origin = session.origin()?;
        let reveals = collapse::cascade(&mut main, &mut board, origin, &mut rng, None)?;
        let promotions = collapse::promote_identities(&main, &mut board, origin)?;
        (reveals, promotions)
    };

    // Nights never change how many cabal members remain: a
    // cabal-on-cabal hit collapses the world instead of killing.
    let setup = phase::surviving_setup(&board, setup.cabal_left, setup.flags);
    let worlds_after = main.len() as u64;

    if let Some(victory) = victory::check_cabal(&main, board.len(), setup.cabal_left) {
        let snapshot = Snapshot {
            setup,
            board,
            actions: orders.raw().to_string(),
            width,
            worlds: main,
        };
        snapshot.write_final(&session.file(FINAL_WORLDS_FILE))?;
        info!(phase = %phase, surviving = worlds_after, "Game ended; final records written");
        return Ok(PhaseOutcome {
            phase,
            worlds_before,
            worlds_after,
            tally,
            reveals,
            promotions,
            setup,
            liveness: snapshot.board.to_wire(),
            bonds_closed: 0,
            bonds_created: 0,
            victory: Some(victory),
        });
    }

    let mut bonds_closed = 0;
    let mut bonds_created = 0;
    if setup.flags.binder {
        let bonds = bond::read_bonds(&session.file(bonds_in), board.len())?;
        let can_bind = bond::binder_candidates(&main, &board);
        let (mut kept, closed) = bond::close_bonds(bonds, &board, &can_bind);
        let matched = bond::create_bonds(
            &mut kept,
            &orders,
            &board,
            Some(&main),
            session.config(),
            phase.number(),
        );
        bond::write_bonds(&bonds_out, &kept)?;
        bonds_closed = closed.len() + matched.evicted.len();
        bonds_created = matched.created.len();
    }

    let snapshot = Snapshot {
        setup,
        board,
        actions: orders.raw().to_string(),
        width,
        worlds: main,
    };
    snapshot.write(&worlds_out)?;
    info!(
        phase = %phase,
        worlds_before,
        worlds_after,
        collapsed = tally.total(),
        reveals = reveals.len(),
        "Night resolved"
    );
    Ok(PhaseOutcome {
        phase,
        worlds_before,
        worlds_after,
        tally,
        reveals,
        promotions,
        setup,
        liveness: snapshot.board.to_wire(),
        bonds_closed,
        bonds_created,
        victory: None,
    })
}

/// What the elimination pass produced: the surviving main set, the
/// parked binder-target worlds, and the counts of worlds collapsed
/// outright.
struct Resolution {
    main: WorldSet,
    side: WorldSet,
    tally: CollapseTally,
}

fn resolve(
    worlds: WorldSet,
    orders: &NightOrders,
    flags: CapabilityFlags,
) -> CollapsarResult<Resolution> {
    let mut main = WorldSet::new();
    let mut side = WorldSet::new();
    let mut tally = CollapseTally::default();
    // True once any surviving world line saw the kill land on (or
    // bounce off) a non-binder; set in world order, so earlier worlds
    // decide the fate of later binder-target worlds.
    let mut hit_nonbinder = false;

    for mut world in worlds {
        let Some(alpha) = world.holder(Role::CabalAlpha) else {
            return Err(PhaseError::MissingHolder {
                ordinal: world.ordinal(),
                role: Role::CabalAlpha,
            }
            .into());
        };
        let target = orders
            .player(alpha)
            .and_then(|slots| slots.eliminate)
            .ok_or(OrdersError::MissingTarget {
                player: alpha,
                capability: Capability::Eliminate,
            })?;

        let protect = if flags.warden {
            world
                .holder(Role::Warden)
                .and_then(|warden| orders.player(warden))
                .and_then(|slots| slots.protect)
        } else {
            None
        };
        let investigate = if flags.seer {
            world
                .holder(Role::Seer)
                .and_then(|seer| orders.player(seer))
                .and_then(|slots| slots.investigate)
        } else {
            None
        };
        let kill_blocked = protect == Some(target);
        let probe_blocked =
            matches!((protect, investigate), (Some(p), Some(i)) if p == i);

        match world.role(target) {
            Role::Seer | Role::Watcher | Role::Warden | Role::Citizen | Role::Slain => {
                let seer_lives = world.role(target) != Role::Seer || kill_blocked;
                if probe_blocked && seer_lives {
                    tally.seer_meets_warden += 1;
                    continue;
                }
                hit_nonbinder = true;
                if !kill_blocked {
                    world.set_role(target, Role::Slain);
                }
                main.push(world);
            }
            Role::Binder => {
                if probe_blocked {
                    tally.seer_meets_warden += 1;
                } else if kill_blocked {
                    hit_nonbinder = true;
                    main.push(world);
                } else if hit_nonbinder {
                    tally.binder_immortality += 1;
                } else {
                    world.set_role(target, Role::Slain);
                    side.push(world);
                }
            }
            Role::CabalAlpha | Role::CabalBeta | Role::CabalGamma => {
                tally.cabal_on_cabal += 1;
            }
            Role::Exiled => {
                return Err(PhaseError::UnexpectedSymbol {
                    ordinal: world.ordinal(),
                    player: target,
                    symbol: Role::Exiled.as_char(),
                }
                .into());
            }
        }
    }
    Ok(Resolution { main, side, tally })
}
