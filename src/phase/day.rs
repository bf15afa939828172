//! Day resolution.
//!
//! The day exiles one player by public vote. Unlike the night kill
//! the vote names the same target everywhere, and it lands on cabal
//! symbols too; a world collapses only when it shows the target as
//! already slain, which no public exile can follow. Binder-target
//! worlds park on the same side set the night uses.
//!
//! The vote is also the only removal that can shrink the cabal, so
//! the day recounts it afterwards, runs the citizen and draw checks
//! the nights skip, and in every surviving world that lost its
//! leader hands the alpha symbol to the next cabal member.

use tracing::{info, warn};

use crate::bond;
use crate::collapse;
use crate::error::{CollapsarResult, OrdersError, PhaseError};
use crate::orders::Vote;
use crate::phase::{self, CollapseTally, PhaseId, PhaseOutcome};
use crate::player::{LivenessBoard, PlayerId};
use crate::role::Role;
use crate::session::{Session, FINAL_WORLDS_FILE};
use crate::store::Snapshot;
use crate::victory;
use crate::world::WorldSet;

/// Runs one day against the game directory.
pub fn run(session: &mut Session, day: u32, vote: &str) -> CollapsarResult<PhaseOutcome> {
    let phase = PhaseId::Day(day);
    let (Some(worlds_out), Some(bonds_in)) = (phase.worlds_out(), phase.bonds_in()) else {
        unreachable!("only the bootstrap night lacks a world output");
    };
    let worlds_out = session.file(&worlds_out);
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

    let vote = Vote::parse(vote, &board)?;
    let mut rng = session.rng(phase);
    let Some(target) = vote.draw(&mut rng) else {
        return Err(OrdersError::EmptyVote.into());
    };
    if vote.candidates().len() > 1 {
        info!(phase = %phase, target = %target, "Tied vote resolved by draw");
    }

    let worlds_before = worlds.len() as u64;
    let Resolution {
        mut main,
        side,
        mut tally,
    } = resolve(worlds, target)?;

    if main.is_empty() && !side.is_empty() {
        warn!(
            parked = side.len(),
            "The vote found the binder in every world line"
        );
        main = side;
    } else {
        tally.binder_immortality += side.len() as u64;
    }
    if main.is_empty() {
        return Err(PhaseError::paradox("day resolution").into());
    }

    let (reveals, promotions) = {
        let origin = session.origin()?;
        let reveals = collapse::cascade(&mut main, &mut board, origin, &mut rng, Some(target))?;
        let promotions = collapse::promote_identities(&main, &mut board, origin)?;
        (reveals, promotions)
    };

    let cabal_left = remaining_cabal(&board, session.config().cabal);
    let setup = phase::surviving_setup(&board, cabal_left, setup.flags);
    let worlds_after = main.len() as u64;

    let victory = if setup.cabal_left == 0 {
        Some(victory::check_citizens(
            &main,
            board.len(),
            setup.players_left,
        ))
    } else {
        victory::check_cabal(&main, board.len(), setup.cabal_left)
    };
    if let Some(victory) = victory {
        let snapshot = Snapshot {
            setup,
            board,
            actions: String::new(),
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

    promote_leadership(&mut main);

    let mut bonds_closed = 0;
    if setup.flags.binder {
        let bonds = bond::read_bonds(&session.file(&bonds_in), board.len())?;
        let can_bind = bond::binder_candidates(&main, &board);
        let (kept, closed) = bond::close_bonds(bonds, &board, &can_bind);
        bond::write_bonds(&bonds_out, &kept)?;
        bonds_closed = closed.len();
    }

    let snapshot = Snapshot {
        setup,
        board,
        actions: String::new(),
        width,
        worlds: main,
    };
    snapshot.write(&worlds_out)?;
    info!(
        phase = %phase,
        target = %target,
        worlds_before,
        worlds_after,
        collapsed = tally.total(),
        reveals = reveals.len(),
        "Day resolved"
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
        bonds_created: 0,
        victory: None,
    })
}

/// What the exile pass produced: the surviving main set, the parked
/// binder-target worlds, and the count of worlds collapsed outright.
struct Resolution {
    main: WorldSet,
    side: WorldSet,
    tally: CollapseTally,
}

fn resolve(worlds: WorldSet, target: PlayerId) -> CollapsarResult<Resolution> {
    let mut main = WorldSet::new();
    let mut side = WorldSet::new();
    let mut tally = CollapseTally::default();
    // Same side-set rule as the night: binder-target worlds park, and
    // survive only if no world line saw the vote land on a non-binder.
    let mut hit_nonbinder = false;

    for mut world in worlds {
        match world.role(target) {
            Role::Slain => {
                tally.already_removed += 1;
            }
            Role::Binder => {
                if hit_nonbinder {
                    tally.binder_immortality += 1;
                } else {
                    world.set_role(target, Role::Exiled);
                    side.push(world);
                }
            }
            Role::CabalAlpha
            | Role::CabalBeta
            | Role::CabalGamma
            | Role::Seer
            | Role::Watcher
            | Role::Warden
            | Role::Citizen => {
                world.set_role(target, Role::Exiled);
                hit_nonbinder = true;
                main.push(world);
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

/// Recounts the cabal from the board. Votes are the only removals
/// that can land on a cabal member, so every cabal loss sits on the
/// board as a certain identity.
fn remaining_cabal(board: &LivenessBoard, cabal: usize) -> usize {
    let fallen = board
        .players()
        .filter(|&player| !board.is_alive(player))
        .filter(|&player| board.identity(player).is_some_and(|role| role.is_cabal()))
        .count();
    cabal.saturating_sub(fallen)
}

/// Hands the alpha symbol down in every world whose leader is gone:
/// the beta holder takes it, the gamma stepping up behind, or the
/// gamma directly when no beta survives.
fn promote_leadership(worlds: &mut WorldSet) {
    for world in worlds.iter_mut() {
        if world.holder(Role::CabalAlpha).is_some() {
            continue;
        }
        if let Some(beta) = world.holder(Role::CabalBeta) {
            world.set_role(beta, Role::CabalAlpha);
            if let Some(gamma) = world.holder(Role::CabalGamma) {
                world.set_role(gamma, Role::CabalBeta);
            }
        } else if let Some(gamma) = world.holder(Role::CabalGamma) {
            world.set_role(gamma, Role::CabalAlpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapabilityFlags, GameConfig};
    use crate::error::{CollapsarError, StoreError};
    use crate::player::RemovalCause;
    use crate::victory::Victory;
    use crate::world::World;

    fn player(letter: char) -> PlayerId {
        PlayerId::from_letter(letter).unwrap()
    }

    fn flags(seer: bool, binder: bool, watcher: bool, warden: bool) -> CapabilityFlags {
        CapabilityFlags {
            seer,
            binder,
            watcher,
            warden,
        }
    }

    fn game(
        players: usize,
        cabal: usize,
        flags: CapabilityFlags,
        seed: u64,
    ) -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let config = GameConfig::create(players, cabal, flags, seed).unwrap();
        let session = Session::create(dir.path(), config).unwrap();
        (dir, session)
    }

    /// Stages a day input snapshot holding the origin worlds the map
    /// keeps, after any overlay edits it makes.
    fn stage_day_input(
        session: &Session,
        day: u32,
        board: &LivenessBoard,
        map: impl Fn(World) -> Option<World>,
    ) {
        let origin = Snapshot::read(&session.origin_path()).unwrap();
        let worlds: WorldSet = origin.worlds.into_iter().filter_map(&map).collect();
        let snapshot = Snapshot {
            setup: phase::surviving_setup(board, session.config().cabal, session.config().flags),
            board: board.clone(),
            actions: String::new(),
            width: origin.width,
            worlds,
        };
        snapshot
            .write(&session.file(&PhaseId::Day(day).worlds_in()))
            .unwrap();
    }

    #[test]
    fn test_day_exiles_the_target_and_flips_the_vote() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 7);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, |w| {
            (w.role(player('B')) != Role::CabalAlpha).then_some(w)
        });

        let outcome = session.day(1, "B").unwrap();

        assert_eq!(outcome.phase, PhaseId::Day(1));
        assert_eq!(outcome.worlds_before, 2);
        assert_eq!(outcome.worlds_after, 2);
        assert_eq!(outcome.tally.total(), 0);
        assert_eq!(outcome.reveals.len(), 1);
        assert_eq!(outcome.reveals[0].player, player('B'));
        assert_eq!(outcome.reveals[0].identity, Role::Citizen);
        assert_eq!(outcome.reveals[0].cause, RemovalCause::Voted);
        assert_eq!(outcome.liveness, "##TV##");
        assert_eq!(outcome.setup.players_left, 2);
        assert_eq!(outcome.setup.cabal_left, 1);
        assert!(outcome.victory.is_none());

        let next = Snapshot::read(&session.file("worlds-N1.txt")).unwrap();
        assert_eq!(next.worlds.len(), 2);
        assert!(next.actions.is_empty());
        assert_eq!(next.board.to_wire(), "##TV##");
        assert!(next
            .worlds
            .iter()
            .all(|w| w.role(player('B')) == Role::Exiled));

        let err = session.day(1, "B").unwrap_err();
        assert!(matches!(
            err,
            CollapsarError::Store(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_day_collapses_worlds_where_the_target_already_fell() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 13);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, |mut w| {
            if w.role(player('B')) == Role::CabalAlpha {
                return None;
            }
            if w.ordinal() == 0 {
                w.set_role(player('B'), Role::Slain);
            }
            Some(w)
        });

        let outcome = session.day(1, "B").unwrap();

        assert_eq!(outcome.worlds_before, 2);
        assert_eq!(outcome.tally.already_removed, 1);
        assert_eq!(outcome.worlds_after, 1);
        assert_eq!(outcome.reveals[0].identity, Role::Citizen);
        assert_eq!(outcome.reveals[0].cause, RemovalCause::Voted);

        let next = Snapshot::read(&session.file("worlds-N1.txt")).unwrap();
        let survivor: Vec<u64> = next.worlds.iter().map(World::ordinal).collect();
        assert_eq!(survivor, vec![2]);
    }

    #[test]
    fn test_day_exiling_the_last_cabal_ends_in_citizen_victory() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 19);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, |w| {
            (w.role(player('B')) == Role::CabalAlpha).then_some(w)
        });

        let outcome = session.day(1, "B").unwrap();

        assert_eq!(outcome.worlds_after, 1);
        assert_eq!(outcome.reveals[0].identity, Role::CabalAlpha);
        assert_eq!(outcome.setup.cabal_left, 0);
        assert_eq!(outcome.liveness, "##AV##");
        match outcome.victory {
            Some(Victory::Citizens {
                always_alive,
                sometimes_alive,
                min_living,
                max_living,
            }) => {
                assert_eq!(always_alive, vec![player('A'), player('C')]);
                assert!(sometimes_alive.is_empty());
                assert_eq!(min_living, 2);
                assert_eq!(max_living, 2);
            }
            other => panic!("expected a citizen victory, got {other:?}"),
        }

        assert!(!session.file("worlds-N1.txt").exists());
        let last = std::fs::read_to_string(session.file(FINAL_WORLDS_FILE)).unwrap();
        assert_eq!(last, "1-TVT");
    }

    #[test]
    fn test_day_cabal_wins_when_no_rival_survives_the_vote() {
        let (_dir, mut session) = game(4, 1, CapabilityFlags::none(), 31);
        let mut board = LivenessBoard::new(4);
        board.resolve(player('C'), Role::Citizen, RemovalCause::Eliminated);
        board.resolve(player('D'), Role::Citizen, RemovalCause::Eliminated);
        stage_day_input(&session, 1, &board, |mut w| {
            if w.role(player('A')) != Role::CabalAlpha {
                return None;
            }
            w.set_role(player('C'), Role::Slain);
            w.set_role(player('D'), Role::Slain);
            Some(w)
        });

        let outcome = session.day(1, "B").unwrap();

        assert_eq!(outcome.worlds_after, 1);
        assert_eq!(outcome.setup.players_left, 1);
        assert_eq!(outcome.setup.cabal_left, 1);
        match outcome.victory {
            Some(Victory::Cabal {
                always,
                sometimes,
                cabal_left,
            }) => {
                assert_eq!(always, vec![player('A')]);
                assert!(sometimes.is_empty());
                assert_eq!(cabal_left, 1);
            }
            other => panic!("expected a cabal victory, got {other:?}"),
        }
        assert!(session.file(FINAL_WORLDS_FILE).exists());
        assert!(!session.file("worlds-N1.txt").exists());
    }

    #[test]
    fn test_day_hands_leadership_to_the_surviving_cabal() {
        let (_dir, mut session) = game(4, 2, CapabilityFlags::none(), 37);
        let board = LivenessBoard::new(4);
        stage_day_input(&session, 1, &board, |w| {
            (w.role(player('B')) == Role::CabalAlpha).then_some(w)
        });

        let outcome = session.day(1, "B").unwrap();

        assert_eq!(outcome.worlds_before, 3);
        assert_eq!(outcome.worlds_after, 3);
        assert_eq!(outcome.reveals[0].identity, Role::CabalAlpha);
        assert_eq!(outcome.setup.cabal_left, 1);
        assert!(outcome.victory.is_none());

        // The exiled leader's seat passes on: every surviving world
        // still names an alpha, and its beta symbol went with it.
        let next = Snapshot::read(&session.file("worlds-N1.txt")).unwrap();
        for world in &next.worlds {
            assert!(world.holder(Role::CabalAlpha).is_some());
            assert!(world.holder(Role::CabalBeta).is_none());
        }
    }

    #[test]
    fn test_day_promotes_parked_worlds_when_every_line_held_the_binder() {
        let (_dir, mut session) = game(4, 1, flags(false, true, false, false), 41);
        let board = LivenessBoard::new(4);
        stage_day_input(&session, 1, &board, |w| {
            (w.role(player('D')) == Role::Binder).then_some(w)
        });

        let outcome = session.day(1, "D").unwrap();

        assert_eq!(outcome.worlds_before, 3);
        assert_eq!(outcome.worlds_after, 3);
        assert_eq!(outcome.tally.binder_immortality, 0);
        assert_eq!(outcome.reveals[0].identity, Role::Binder);
        assert_eq!(outcome.reveals[0].cause, RemovalCause::Voted);
        assert!(!outcome.setup.flags.binder);
        assert_eq!(outcome.liveness, "######EV");
        // With the binder certainly gone no bond file moves; note the
        // staged game never wrote a bonds-D1.txt to read.
        assert!(!session.file("bonds-N1.txt").exists());

        let next = Snapshot::read(&session.file("worlds-N1.txt")).unwrap();
        assert_eq!(next.worlds.len(), 3);
        assert!(next
            .worlds
            .iter()
            .all(|w| w.role(player('D')) == Role::Exiled));
    }

    #[test]
    fn test_day_discards_parked_worlds_once_a_rival_fell() {
        let (_dir, mut session) = game(4, 1, flags(false, true, false, false), 43);
        let board = LivenessBoard::new(4);
        stage_day_input(&session, 1, &board, |w| {
            (w.role(player('D')) != Role::CabalAlpha).then_some(w)
        });
        bond::write_bonds(&session.file("bonds-D1.txt"), &[]).unwrap();

        let outcome = session.day(1, "D").unwrap();

        assert_eq!(outcome.worlds_before, 9);
        assert_eq!(outcome.tally.binder_immortality, 3);
        assert_eq!(outcome.worlds_after, 6);
        assert_eq!(outcome.reveals[0].identity, Role::Citizen);
        assert_eq!(outcome.liveness, "######TV");
        // D died a citizen, so the binder capability stays on and the
        // bond file rolls forward.
        assert!(outcome.setup.flags.binder);
        assert!(session.file("bonds-N1.txt").exists());
    }

    #[test]
    fn test_day_draws_one_target_from_a_tied_vote() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 53);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, Some);

        let outcome = session.day(1, "AC").unwrap();

        let target = outcome.reveals[0].player;
        assert!(target == player('A') || target == player('C'));
        assert_eq!(outcome.reveals[0].cause, RemovalCause::Voted);
    }

    #[test]
    fn test_day_rejects_a_vote_on_an_exile_overlay() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 59);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, |mut w| {
            w.set_role(player('B'), Role::Exiled);
            Some(w)
        });

        let err = session.day(1, "B").unwrap_err();
        assert!(matches!(
            err,
            CollapsarError::Phase(PhaseError::UnexpectedSymbol { .. })
        ));
        assert!(!session.file("worlds-N1.txt").exists());
    }

    #[test]
    fn test_day_with_every_world_inconsistent_is_a_paradox() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 2);
        let board = LivenessBoard::new(3);
        stage_day_input(&session, 1, &board, |mut w| {
            w.set_role(player('B'), Role::Slain);
            Some(w)
        });

        let err = session.day(1, "B").unwrap_err();
        assert!(err.is_paradox());
        assert!(!session.file("worlds-N1.txt").exists());
    }
}
