//! The collapse engine: certainty discovery, flips, and pruning.
//!
//! After a phase transforms the world set, some player may now be
//! removed in every surviving world. That player's true identity is
//! still open, so the engine flips them: it asks the origin snapshot
//! what they originally were in each surviving world, draws one
//! ground truth, records it on the liveness board, and prunes every
//! world that disagrees. Pruning can make further players certain, so
//! the whole thing iterates to a fixed point (the cascade).
//!
//! The binder is the exception. While any surviving world disagrees
//! about who holds it, a flip that finds the binder in every world
//! records the identity without pruning anything; the disagreement
//! that keeps other players uncertain is itself evidence the binder
//! never resolved to a single world line.

use serde::Serialize;
use tracing::debug;

use crate::error::{CollapsarResult, PhaseError, StoreError};
use crate::player::{LivenessBoard, PlayerId, RemovalCause};
use crate::rng::PhaseRng;
use crate::role::Role;
use crate::store::OriginPin;
use crate::world::{World, WorldSet};

/// A player revealed as certainly removed, with the ground-truth
/// identity the flip chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reveal {
    pub player: PlayerId,
    /// Chosen identity, cabal sub-symbols normalized to the alpha.
    pub identity: Role,
    pub cause: RemovalCause,
}

/// A living player's identity, promoted because every surviving
/// world agrees on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Promotion {
    pub player: PlayerId,
    pub identity: Role,
}

/// Runs the certainty/flip/prune loop to a fixed point, recording
/// each reveal on the board. The voted player, when newly certain, is
/// always flipped before anyone else; every other reveal is an
/// elimination.
///
/// An explicit loop, not recursion: each flip's immortal-binder test
/// depends on the set as it stands when that flip runs.
pub fn cascade(
    worlds: &mut WorldSet,
    board: &mut LivenessBoard,
    origin: &OriginPin,
    rng: &mut PhaseRng,
    voted: Option<PlayerId>,
) -> CollapsarResult<Vec<Reveal>> {
    let mut reveals = Vec::new();
    loop {
        if worlds.is_empty() {
            return Err(PhaseError::paradox("cascade").into());
        }
        let mut pending = newly_removed(worlds, board);
        if pending.is_empty() {
            return Ok(reveals);
        }
        if let Some(voted) = voted {
            if let Some(at) = pending.iter().position(|&p| p == voted) {
                let first = pending.remove(at);
                pending.insert(0, first);
            }
        }
        for player in pending {
            let cause = if voted == Some(player) {
                RemovalCause::Voted
            } else {
                RemovalCause::Eliminated
            };
            reveals.push(flip(worlds, board, origin, rng, player, cause)?);
        }
    }
}

/// Players alive on the board but removed in every surviving world,
/// in seat order. Single pass over the set, dropping each player at
/// their first world alive; whoever is left never appeared alive.
fn newly_removed(worlds: &WorldSet, board: &LivenessBoard) -> Vec<PlayerId> {
    let mut unseen: Vec<PlayerId> = board.players().filter(|&p| board.is_alive(p)).collect();
    for world in worlds {
        if unseen.is_empty() {
            break;
        }
        unseen.retain(|&player| !world.role(player).is_alive());
    }
    unseen
}

/// Chooses one ground-truth identity for a newly-certain player and
/// prunes the set to the worlds that agree.
fn flip(
    worlds: &mut WorldSet,
    board: &mut LivenessBoard,
    origin: &OriginPin,
    rng: &mut PhaseRng,
    player: PlayerId,
    cause: RemovalCause,
) -> CollapsarResult<Reveal> {
    let mut origins: Vec<Role> = Vec::with_capacity(worlds.len());
    let mut non_binder: Vec<usize> = Vec::new();
    let mut binder_seen = false;
    for (at, world) in worlds.iter().enumerate() {
        let original = origin
            .original_role(player, world.ordinal())?
            .normalize_cabal();
        if original == Role::Binder {
            binder_seen = true;
        } else {
            non_binder.push(at);
        }
        origins.push(original);
    }

    if binder_seen && non_binder.is_empty() {
        // The player holds the binder in every surviving world: the
        // identity is already certain and no world disagrees, so
        // nothing collapses.
        debug!(player = %player, "flip found the binder in every world");
        board.resolve(player, Role::Binder, cause);
        return Ok(Reveal {
            player,
            identity: Role::Binder,
            cause,
        });
    }

    let chosen = if binder_seen {
        // Some worlds still hold the binder here; those world lines
        // never resolve, so the draw runs over the rest.
        rng.choose(&non_binder).copied()
    } else {
        rng.index(worlds.len())
    };
    let Some(chosen) = chosen else {
        return Err(PhaseError::paradox(format!("flip of {player}")).into());
    };
    let identity = origins[chosen];
    debug!(
        player = %player,
        identity = %identity,
        world = chosen_ordinal(worlds, chosen),
        "flip chose a ground truth"
    );

    let before = worlds.len();
    let mut at = 0;
    worlds.retain_where(|_| {
        let keep = origins[at] == identity;
        at += 1;
        keep
    });
    debug!(
        player = %player,
        collapsed = before - worlds.len(),
        surviving = worlds.len(),
        "flip pruned the set"
    );
    if worlds.is_empty() {
        return Err(PhaseError::paradox(format!("flip of {player}")).into());
    }

    board.resolve(player, identity, cause);
    Ok(Reveal {
        player,
        identity,
        cause,
    })
}

fn chosen_ordinal(worlds: &WorldSet, at: usize) -> u64 {
    worlds.iter().nth(at).map_or(0, World::ordinal)
}

/// Promotes the identity of every player (living included) whose role
/// is the same in all surviving worlds. Overlay symbols defer to the
/// origin, cabal sub-symbols compare normalized, and one disagreement
/// disqualifies a player for the rest of the scan.
pub fn promote_identities(
    worlds: &WorldSet,
    board: &mut LivenessBoard,
    origin: &OriginPin,
) -> Result<Vec<Promotion>, StoreError> {
    let mut candidates: Vec<Option<Role>> = vec![None; board.len()];
    let mut pending: Vec<PlayerId> = board
        .players()
        .filter(|&p| board.identity(p).is_none())
        .collect();

    for world in worlds {
        if pending.is_empty() {
            break;
        }
        let mut kept = Vec::with_capacity(pending.len());
        for &player in &pending {
            let mut role = world.role(player).normalize_cabal();
            if role.is_removed() {
                role = origin
                    .original_role(player, world.ordinal())?
                    .normalize_cabal();
            }
            let slot = &mut candidates[player.index()];
            match *slot {
                None => {
                    *slot = Some(role);
                    kept.push(player);
                }
                Some(seen) if seen == role => kept.push(player),
                Some(_) => *slot = None,
            }
        }
        pending = kept;
    }

    let mut promotions = Vec::new();
    for player in pending {
        if let Some(identity) = candidates[player.index()] {
            debug!(player = %player, identity = %identity, "identity uniform across the set");
            board.promote_identity(player, identity);
            promotions.push(Promotion { player, identity });
        }
    }
    Ok(promotions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapabilityFlags, GameConfig};
    use crate::phase::PhaseId;
    use crate::store::{generate, Snapshot};

    fn seer_only() -> CapabilityFlags {
        CapabilityFlags {
            seer: true,
            binder: false,
            watcher: false,
            warden: false,
        }
    }

    fn binder_only() -> CapabilityFlags {
        CapabilityFlags {
            seer: false,
            binder: true,
            watcher: false,
            warden: false,
        }
    }

    /// Generates an origin, reads it back, and marks `slain` removed
    /// in every world so the cascade has work to do.
    fn staged(
        dir: &std::path::Path,
        flags: CapabilityFlags,
        slain: &[PlayerId],
    ) -> (GameConfig, OriginPin, WorldSet, LivenessBoard) {
        let config = GameConfig::create(4, 1, flags, 17).unwrap();
        let path = dir.join("worlds-D1.txt");
        generate(&config, &path).unwrap();
        let origin = OriginPin::open(&path).unwrap();
        let mut worlds = Snapshot::read(&path).unwrap().worlds;
        for world in worlds.iter_mut() {
            for &player in slain {
                world.set_role(player, Role::Slain);
            }
        }
        (config, origin, worlds, LivenessBoard::new(4))
    }

    #[test]
    fn test_newly_removed_finds_only_certain_deaths() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (_, _, mut worlds, board) = staged(dir.path(), seer_only(), &[a]);

        assert_eq!(newly_removed(&worlds, &board), vec![a]);

        // Revive A in a single world: no longer certain.
        let mut revived: Vec<World> = worlds.iter().cloned().collect();
        revived[0].set_role(a, Role::Citizen);
        worlds = revived.into_iter().collect();
        assert!(newly_removed(&worlds, &board).is_empty());
    }

    #[test]
    fn test_newly_removed_skips_already_resolved_players() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (_, _, worlds, mut board) = staged(dir.path(), seer_only(), &[a]);
        board.resolve(a, Role::Citizen, RemovalCause::Eliminated);
        assert!(newly_removed(&worlds, &board).is_empty());
    }

    #[test]
    fn test_cascade_prunes_to_chosen_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (config, origin, mut worlds, mut board) = staged(dir.path(), seer_only(), &[a]);

        let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Night(1));
        let before = worlds.len();
        let reveals = cascade(&mut worlds, &mut board, &origin, &mut rng, None).unwrap();

        assert_eq!(reveals.len(), 1);
        assert_eq!(reveals[0].player, a);
        assert_eq!(reveals[0].cause, RemovalCause::Eliminated);
        let identity = reveals[0].identity;
        assert_eq!(board.identity(a), Some(identity));
        assert!(!board.is_alive(a));
        assert!(worlds.len() < before);
        // Every surviving world agrees with the chosen ground truth.
        for world in &worlds {
            assert_eq!(
                origin
                    .original_role(a, world.ordinal())
                    .unwrap()
                    .normalize_cabal(),
                identity
            );
        }
    }

    #[test]
    fn test_cascade_is_deterministic() {
        let run = || {
            let dir = tempfile::tempdir().unwrap();
            let a = PlayerId::from_index(0);
            let (config, origin, mut worlds, mut board) =
                staged(dir.path(), seer_only(), &[a]);
            let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Day(1));
            let reveals =
                cascade(&mut worlds, &mut board, &origin, &mut rng, Some(a)).unwrap();
            let ordinals: Vec<u64> = worlds.iter().map(World::ordinal).collect();
            (reveals, ordinals)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cascade_votes_record_the_vote_cause() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (config, origin, mut worlds, mut board) = staged(dir.path(), seer_only(), &[a]);

        let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Day(1));
        let reveals = cascade(&mut worlds, &mut board, &origin, &mut rng, Some(a)).unwrap();
        assert_eq!(reveals[0].cause, RemovalCause::Voted);
        assert_eq!(board.status(a), crate::player::PlayerStatus::Exiled);
    }

    #[test]
    fn test_flip_of_certain_binder_prunes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let b = PlayerId::from_index(1);
        let (config, origin, worlds, mut board) = staged(dir.path(), binder_only(), &[]);

        // Keep only the worlds where B holds the binder, then mark B
        // slain everywhere: the flip must find the binder uniformly.
        let mut worlds: WorldSet = worlds
            .into_iter()
            .filter(|w| w.role(b) == Role::Binder)
            .collect();
        for world in worlds.iter_mut() {
            world.set_role(b, Role::Slain);
        }
        let before = worlds.len();
        assert!(before > 1);

        let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Night(1));
        let reveals = cascade(&mut worlds, &mut board, &origin, &mut rng, None).unwrap();
        assert_eq!(reveals.len(), 1);
        assert_eq!(reveals[0].identity, Role::Binder);
        assert_eq!(worlds.len(), before);
        assert_eq!(board.identity(b), Some(Role::Binder));
    }

    #[test]
    fn test_flip_with_binder_in_part_of_set_avoids_binder_worlds() {
        let dir = tempfile::tempdir().unwrap();
        let b = PlayerId::from_index(1);
        let (config, origin, mut worlds, mut board) = staged(dir.path(), binder_only(), &[b]);

        // B is the binder in some worlds and not in others; the draw
        // must land outside the binder worlds every time.
        let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Night(2));
        let reveals = cascade(&mut worlds, &mut board, &origin, &mut rng, None).unwrap();
        assert_ne!(reveals[0].identity, Role::Binder);
        for world in &worlds {
            assert_ne!(
                origin.original_role(b, world.ordinal()).unwrap(),
                Role::Binder
            );
        }
    }

    #[test]
    fn test_cascade_on_empty_set_is_a_paradox() {
        let dir = tempfile::tempdir().unwrap();
        let (config, origin, mut worlds, mut board) = staged(dir.path(), seer_only(), &[]);
        worlds.retain_where(|_| false);

        let mut rng = PhaseRng::for_phase(config.seed, PhaseId::Night(1));
        let err = cascade(&mut worlds, &mut board, &origin, &mut rng, None).unwrap_err();
        assert!(err.is_paradox());
    }

    #[test]
    fn test_promotion_finds_uniform_roles() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (_, origin, mut worlds, mut board) = staged(dir.path(), seer_only(), &[]);

        // Keep only worlds where A is the cabal alpha.
        worlds.retain_where(|w| w.role(a) == Role::CabalAlpha);
        let promotions = promote_identities(&worlds, &mut board, &origin).unwrap();

        assert!(promotions.contains(&Promotion {
            player: a,
            identity: Role::CabalAlpha
        }));
        assert_eq!(board.identity(a), Some(Role::CabalAlpha));
        assert!(board.is_alive(a));
        // The other three players still vary across the set.
        for seat in 1..4 {
            assert_eq!(board.identity(PlayerId::from_index(seat)), None);
        }
    }

    #[test]
    fn test_promotion_reads_overlays_through_the_origin() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (_, origin, mut worlds, mut board) = staged(dir.path(), seer_only(), &[]);

        // A is the alpha in these worlds but carries an overlay; the
        // scan must look through it to the origin symbol.
        worlds.retain_where(|w| w.role(a) == Role::CabalAlpha);
        for world in worlds.iter_mut() {
            world.set_role(a, Role::Slain);
        }
        let promotions = promote_identities(&worlds, &mut board, &origin).unwrap();
        assert!(promotions.contains(&Promotion {
            player: a,
            identity: Role::CabalAlpha
        }));
    }

    #[test]
    fn test_promotion_skips_known_identities_and_disagreements() {
        let dir = tempfile::tempdir().unwrap();
        let a = PlayerId::from_index(0);
        let (_, origin, worlds, mut board) = staged(dir.path(), seer_only(), &[]);
        board.promote_identity(a, Role::Citizen);

        let promotions = promote_identities(&worlds, &mut board, &origin).unwrap();
        assert!(promotions.is_empty());
        // The pre-existing identity is untouched.
        assert_eq!(board.identity(a), Some(Role::Citizen));
    }
}
