//! Pre-checking one player's night block against the world set.
//!
//! Order slips are collected before the night resolves, so a player
//! can ask whether the set can back their block at all: a capability
//! claim needs at least one surviving world where the player holds
//! the matching symbol, and an elimination, investigation, or
//! protection also needs its target alive in such a world. Bond and
//! watch claims are backed by holding the symbol anywhere.
//!
//! Claims no world can back come back as unsupported orders, the
//! never-held ones alone and first; the block is otherwise accepted
//! without revealing which worlds backed it.

use crate::error::{CollapsarResult, OrdersError};
use crate::orders::{Capability, PlayerOrders, UnsupportedOrder};
use crate::phase::PhaseId;
use crate::player::PlayerId;
use crate::session::Session;
use crate::store::SnapshotReader;

/// Checks one player's block against the worlds night `night` will
/// read, without touching any game file.
pub fn run(
    session: &mut Session,
    night: u32,
    player: PlayerId,
    block: &str,
) -> CollapsarResult<()> {
    let phase = PhaseId::Night(night);
    // The bootstrap night takes bond nominations only; there is
    // nothing the untouched origin set could contradict.
    if phase.is_bootstrap() {
        return Ok(());
    }

    let mut reader = SnapshotReader::open(&session.file(&phase.worlds_in()))?;
    if player.index() >= reader.header().board.len() {
        return Err(OrdersError::TargetOutOfRange {
            letter: player.letter(),
            players: reader.header().board.len(),
        }
        .into());
    }
    if !reader.header().board.is_alive(player) {
        return Err(OrdersError::DeadPlayerOrder { player }.into());
    }
    let orders = PlayerOrders::parse(
        player,
        block,
        reader.header().setup.flags,
        &reader.header().board,
    )?;

    let mut held: Vec<Capability> = Vec::new();
    let mut targeted: Vec<(Capability, PlayerId)> = Vec::new();
    for capability in Capability::ALL {
        let Some(target) = orders.target(capability) else {
            continue;
        };
        held.push(capability);
        if matches!(
            capability,
            Capability::Eliminate | Capability::Investigate | Capability::Protect
        ) {
            targeted.push((capability, target));
        }
    }

    // Stream the set, settling each claim at its first backing world;
    // most blocks resolve long before the file ends.
    while !(held.is_empty() && targeted.is_empty()) {
        let Some(next) = reader.next() else {
            break;
        };
        let world = next?;
        let role = world.role(player);
        held.retain(|&capability| capability.role() != role);
        targeted.retain(|&(capability, target)| {
            capability.role() != role || !world.role(target).is_alive()
        });
    }

    if !held.is_empty() {
        let orders = held
            .into_iter()
            .map(|capability| UnsupportedOrder {
                actor: player,
                capability,
                target: None,
            })
            .collect();
        return Err(OrdersError::UnsupportedOrders { orders }.into());
    }
    if !targeted.is_empty() {
        let orders = targeted
            .into_iter()
            .map(|(capability, target)| UnsupportedOrder {
                actor: player,
                capability,
                target: Some(target),
            })
            .collect();
        return Err(OrdersError::UnsupportedOrders { orders }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapabilityFlags, GameConfig};
    use crate::error::CollapsarError;
    use crate::phase;
    use crate::player::{LivenessBoard, RemovalCause};
    use crate::role::Role;
    use crate::store::Snapshot;
    use crate::world::{World, WorldSet};

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

    /// Stages the night-input snapshot the check reads, holding the
    /// origin worlds the map keeps after any overlay edits.
    fn stage_check_input(
        session: &Session,
        night: u32,
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
            .write(&session.file(&PhaseId::Night(night).worlds_in()))
            .unwrap();
    }

    #[test]
    fn test_check_accepts_a_block_some_world_backs() {
        let (_dir, mut session) = game(4, 1, flags(true, false, false, false), 11);
        let board = LivenessBoard::new(4);
        stage_check_input(&session, 1, &board, Some);

        assert!(session.check_orders(1, player('A'), "BB").is_ok());
    }

    #[test]
    fn test_check_accepts_an_all_pass_block() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 31);
        let board = LivenessBoard::new(3);
        stage_check_input(&session, 1, &board, Some);

        assert!(session.check_orders(1, player('C'), "#").is_ok());
    }

    #[test]
    fn test_check_passes_everything_on_the_bootstrap_night() {
        let (_dir, mut session) = game(4, 1, flags(true, false, false, false), 11);

        assert!(session.check_orders(0, player('Z'), "!!").is_ok());
    }

    #[test]
    fn test_check_rejects_a_dead_player() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 5);
        let mut board = LivenessBoard::new(3);
        board.resolve(player('B'), Role::Citizen, RemovalCause::Eliminated);
        stage_check_input(&session, 1, &board, |mut w| {
            if w.role(player('B')) == Role::CabalAlpha {
                return None;
            }
            w.set_role(player('B'), Role::Slain);
            Some(w)
        });

        let err = session.check_orders(1, player('B'), "#").unwrap_err();
        assert!(matches!(
            err,
            CollapsarError::Orders(OrdersError::DeadPlayerOrder { .. })
        ));
    }

    #[test]
    fn test_check_rejects_a_player_outside_the_roster() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 5);
        let board = LivenessBoard::new(3);
        stage_check_input(&session, 1, &board, Some);

        let err = session.check_orders(1, player('E'), "#").unwrap_err();
        assert!(matches!(
            err,
            CollapsarError::Orders(OrdersError::TargetOutOfRange { letter: 'E', .. })
        ));
    }

    #[test]
    fn test_check_rejects_a_capability_never_held() {
        let (_dir, mut session) = game(3, 1, CapabilityFlags::none(), 5);
        let board = LivenessBoard::new(3);
        stage_check_input(&session, 1, &board, |w| {
            (w.role(player('A')) != Role::CabalAlpha).then_some(w)
        });

        let err = session.check_orders(1, player('A'), "B").unwrap_err();
        let CollapsarError::Orders(OrdersError::UnsupportedOrders { orders }) = err else {
            panic!("expected unsupported orders, got {err:?}");
        };
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].actor, player('A'));
        assert_eq!(orders[0].capability, Capability::Eliminate);
        assert_eq!(orders[0].target, None);
    }

    #[test]
    fn test_check_reports_never_held_before_dead_targets() {
        let (_dir, mut session) = game(4, 1, flags(true, false, false, false), 17);
        let board = LivenessBoard::new(4);
        stage_check_input(&session, 1, &board, |mut w| {
            if w.role(player('A')) == Role::CabalAlpha {
                return None;
            }
            if w.role(player('A')) == Role::Seer {
                w.set_role(player('C'), Role::Slain);
            }
            Some(w)
        });

        let err = session.check_orders(1, player('A'), "BC").unwrap_err();
        let CollapsarError::Orders(OrdersError::UnsupportedOrders { orders }) = err else {
            panic!("expected unsupported orders, got {err:?}");
        };
        // The investigation fails only on its dead target, but the
        // never-held elimination pre-empts the whole report.
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].capability, Capability::Eliminate);
        assert!(orders[0].target.is_none());
    }

    #[test]
    fn test_check_rejects_a_target_dead_where_the_role_is_held() {
        let (_dir, mut session) = game(4, 1, flags(true, false, false, false), 23);
        let board = LivenessBoard::new(4);
        stage_check_input(&session, 1, &board, |mut w| {
            if w.role(player('A')) == Role::Seer {
                w.set_role(player('C'), Role::Slain);
            }
            Some(w)
        });

        let err = session.check_orders(1, player('A'), "#C").unwrap_err();
        let CollapsarError::Orders(OrdersError::UnsupportedOrders { orders }) = err else {
            panic!("expected unsupported orders, got {err:?}");
        };
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].capability, Capability::Investigate);
        assert_eq!(orders[0].target, Some(player('C')));
    }

    #[test]
    fn test_check_backs_bond_and_watch_by_holding_alone() {
        let (_dir, mut session) = game(4, 1, flags(false, true, true, false), 29);
        let board = LivenessBoard::new(4);
        stage_check_input(&session, 1, &board, |mut w| {
            w.set_role(player('B'), Role::Slain);
            w.set_role(player('D'), Role::Slain);
            Some(w)
        });

        // B and D are gone from every staged world, yet the bond
        // nomination and the watch stand on the held symbols alone.
        assert!(session.check_orders(1, player('A'), "#BD").is_ok());
    }
}
