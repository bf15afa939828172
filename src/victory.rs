//! Victory evaluation over the surviving world set.
//!
//! The cabal wins when, in every surviving world, the living players
//! outside the cabal are strictly outnumbered by the cabal members
//! still in play. The citizens win once the cabal is certainly gone,
//! unless nobody at all is left alive anywhere, which is a draw.
//! Cabal members can only leave play through the day vote, so the
//! citizen and draw checks run on days only; nights check the cabal
//! side alone.

use serde::Serialize;
use tracing::info;

use crate::player::PlayerId;
use crate::world::WorldSet;

/// A game-ending verdict.
///
/// Winner sets distinguish players who hold the winning position in
/// every surviving world from those who hold it in only some, since
/// the game can end while identities are still uncertain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "winner", rename_all = "snake_case")]
pub enum Victory {
    /// The cabal controls every surviving world.
    Cabal {
        /// Players who are cabal in every surviving world.
        always: Vec<PlayerId>,
        /// Players who are cabal in some worlds but not all.
        sometimes: Vec<PlayerId>,
        /// How many cabal members remain in play.
        cabal_left: usize,
    },
    /// The cabal is certainly gone and somebody is still standing.
    Citizens {
        /// Players alive in every surviving world.
        always_alive: Vec<PlayerId>,
        /// Players alive in some worlds but not all.
        sometimes_alive: Vec<PlayerId>,
        /// Fewest simultaneously living players across worlds.
        min_living: usize,
        /// Most simultaneously living players across worlds.
        max_living: usize,
    },
    /// The cabal is gone and so is everyone else.
    Draw,
}

/// Scans for a cabal victory.
///
/// Declared only when every surviving world leaves the cabal with a
/// strict majority over everyone else alive there. The scan stops at
/// the first counterexample world, so the common no-victory case
/// rarely reads the whole set.
#[must_use]
pub fn check_cabal(worlds: &WorldSet, players: usize, cabal_left: usize) -> Option<Victory> {
    if worlds.is_empty() {
        return None;
    }
    let mut always = vec![true; players];
    let mut sometimes = vec![false; players];
    for world in worlds {
        let mut living_others = 0;
        for (index, role) in world.roles().iter().enumerate() {
            if role.is_cabal() {
                sometimes[index] = true;
                continue;
            }
            always[index] = false;
            if role.is_removed() {
                continue;
            }
            living_others += 1;
            if living_others >= cabal_left {
                return None;
            }
        }
    }
    let always_players = gather(&always, |_| true);
    let sometimes_players = gather(&sometimes, |index| !always[index]);
    info!(
        cabal_left,
        surviving = worlds.len(),
        "Cabal victory: the cabal controls every surviving world"
    );
    Some(Victory::Cabal {
        always: always_players,
        sometimes: sometimes_players,
        cabal_left,
    })
}

/// Settles the game once the cabal count has reached zero: a citizen
/// victory naming who could still be standing, or a draw when nobody
/// is alive in any surviving world.
#[must_use]
pub fn check_citizens(worlds: &WorldSet, players: usize, players_left: usize) -> Victory {
    let mut always_alive = vec![true; players];
    let mut sometimes_alive = vec![false; players];
    let mut min_living = players_left;
    let mut max_living = 0;
    for world in worlds {
        let mut living = 0;
        for (index, role) in world.roles().iter().enumerate() {
            if role.is_alive() {
                sometimes_alive[index] = true;
                living += 1;
            } else {
                always_alive[index] = false;
            }
        }
        min_living = min_living.min(living);
        max_living = max_living.max(living);
    }
    if !sometimes_alive.contains(&true) {
        info!("Draw: every player is dead in every surviving world");
        return Victory::Draw;
    }
    let always = gather(&always_alive, |_| true);
    let sometimes = gather(&sometimes_alive, |index| !always_alive[index]);
    info!(
        min_living,
        max_living,
        surviving = worlds.len(),
        "Citizen victory: the cabal is gone"
    );
    Victory::Citizens {
        always_alive: always,
        sometimes_alive: sometimes,
        min_living,
        max_living,
    }
}

fn gather(flags: &[bool], keep: impl Fn(usize) -> bool) -> Vec<PlayerId> {
    flags
        .iter()
        .enumerate()
        .filter(|&(index, &set)| set && keep(index))
        .map(|(index, _)| PlayerId::from_index(index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::world::World;

    fn player(letter: char) -> PlayerId {
        PlayerId::from_letter(letter).unwrap()
    }

    fn world(ordinal: u64, symbols: &str) -> World {
        let roles = symbols
            .chars()
            .map(|c| Role::from_char(c).unwrap())
            .collect();
        World::new(ordinal, roles)
    }

    #[test]
    fn test_cabal_victory_with_certain_cabal() {
        let worlds: WorldSet = [world(0, "AXVX"), world(1, "AVXX")].into_iter().collect();
        let victory = check_cabal(&worlds, 4, 1).unwrap();
        assert_eq!(
            victory,
            Victory::Cabal {
                always: vec![player('A')],
                sometimes: vec![],
                cabal_left: 1,
            }
        );
    }

    #[test]
    fn test_cabal_victory_with_uncertain_cabal() {
        // The last cabal member is A in one world and C in the other;
        // nobody else is left alive in either.
        let worlds: WorldSet = [world(0, "AXXV"), world(1, "XXAV")].into_iter().collect();
        let victory = check_cabal(&worlds, 4, 1).unwrap();
        assert_eq!(
            victory,
            Victory::Cabal {
                always: vec![],
                sometimes: vec![player('A'), player('C')],
                cabal_left: 1,
            }
        );
    }

    #[test]
    fn test_no_cabal_victory_while_any_world_resists() {
        // World 1 keeps a living citizen, matching the cabal's count.
        let worlds: WorldSet = [world(0, "AXVX"), world(1, "ATVX")].into_iter().collect();
        assert_eq!(check_cabal(&worlds, 4, 1), None);
    }

    #[test]
    fn test_no_cabal_victory_on_empty_set() {
        let worlds = WorldSet::new();
        assert_eq!(check_cabal(&worlds, 4, 1), None);
    }

    #[test]
    fn test_citizen_victory_reports_survivor_range() {
        let worlds: WorldSet = [world(0, "XTVT"), world(1, "XTVX")].into_iter().collect();
        let victory = check_citizens(&worlds, 4, 2);
        assert_eq!(
            victory,
            Victory::Citizens {
                always_alive: vec![player('B')],
                sometimes_alive: vec![player('D')],
                min_living: 1,
                max_living: 2,
            }
        );
    }

    #[test]
    fn test_draw_when_everyone_is_dead_everywhere() {
        let worlds: WorldSet = [world(0, "XXVX"), world(1, "VXXX")].into_iter().collect();
        assert_eq!(check_citizens(&worlds, 4, 0), Victory::Draw);
    }

    #[test]
    fn test_victory_serializes_tagged() {
        let json = serde_json::to_string(&Victory::Draw).unwrap();
        assert_eq!(json, r#"{"winner":"draw"}"#);

        let victory = Victory::Cabal {
            always: vec![player('B')],
            sometimes: vec![],
            cabal_left: 1,
        };
        let json = serde_json::to_string(&victory).unwrap();
        assert!(json.contains(r#""winner":"cabal""#));
        assert!(json.contains(r#""cabal_left":1"#));
    }
}
