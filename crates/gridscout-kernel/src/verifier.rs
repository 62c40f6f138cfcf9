//! [`MoveVerifier`] – safety interlock for robot movements.
//!
//! Before a movement is handed to the robot, pass it through
//! [`MoveVerifier::verify`].  Every registered [`Rule`] is evaluated in
//! order; the first violation returns [`ScoutError::UnsafeMove`] and the
//! movement is **not** executed.
//!
//! Built-in rules:
//! - [`FootprintClearanceRule`] – the 3×3 footprint after a translation must
//!   lie inside the arena and overlap no known obstacle.
//! - [`VirtualWallRule`] – the centre after a translation must not be a
//!   virtual wall.
//!
//! Turns and calibration never change the footprint and always pass.

use gridscout_perception::GridMap;
use gridscout_types::{GridCoord, Movement, Pose, ScoutError};
use tracing::warn;

/// A movement about to be executed from `from`, judged against `map`.
pub struct MoveIntent<'a> {
    pub map: &'a GridMap,
    pub from: Pose,
    pub movement: Movement,
}

impl MoveIntent<'_> {
    /// Footprint centre after the movement, if it is a translation.
    pub fn destination(&self) -> Option<GridCoord> {
        let step = match self.movement {
            Movement::Forward => 1,
            Movement::Backward => -1,
            _ => return None,
        };
        Some(self.from.coord().step(self.from.direction, step))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

pub trait Rule: Send + Sync {
    /// Used in violation messages.
    fn name(&self) -> &str;

    fn check(&self, intent: &MoveIntent<'_>) -> Result<(), ScoutError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MoveVerifier
// ────────────────────────────────────────────────────────────────────────────

/// # Example
///
/// ```
/// use gridscout_kernel::verifier::{MoveIntent, MoveVerifier};
/// use gridscout_perception::{ArenaGeometry, GridMap};
/// use gridscout_types::{Direction, Movement, Pose};
///
/// let mut map = GridMap::new(ArenaGeometry::default());
/// map.mark_start_zone();
/// let verifier = MoveVerifier::standard();
///
/// let backwards = MoveIntent {
///     map: &map,
///     from: Pose::new(1, 1, Direction::North),
///     movement: Movement::Backward,
/// };
/// assert!(verifier.verify(&backwards).is_err());
/// ```
#[derive(Default)]
pub struct MoveVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl MoveVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A verifier with both built-in rules.
    pub fn standard() -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(FootprintClearanceRule));
        verifier.add_rule(Box::new(VirtualWallRule));
        verifier
    }

    /// Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn verify(&self, intent: &MoveIntent<'_>) -> Result<(), ScoutError> {
        for rule in &self.rules {
            if let Err(err) = rule.check(intent) {
                warn!(rule = rule.name(), error = %err, "move rejected");
                return Err(err);
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

pub struct FootprintClearanceRule;

impl Rule for FootprintClearanceRule {
    fn name(&self) -> &str {
        "footprint_clearance"
    }

    fn check(&self, intent: &MoveIntent<'_>) -> Result<(), ScoutError> {
        let Some(center) = intent.destination() else {
            return Ok(());
        };
        for dr in -1..=1 {
            for dc in -1..=1 {
                let cell = center.offset(dr, dc);
                if !intent.map.contains(cell) {
                    return Err(ScoutError::UnsafeMove {
                        movement: intent.movement,
                        reason: format!("footprint cell {cell} is outside the arena"),
                    });
                }
                if intent.map.is_obstacle(cell) {
                    return Err(ScoutError::UnsafeMove {
                        movement: intent.movement,
                        reason: format!("footprint cell {cell} is an obstacle"),
                    });
                }
            }
        }
        Ok(())
    }
}

pub struct VirtualWallRule;

impl Rule for VirtualWallRule {
    fn name(&self) -> &str {
        "virtual_wall"
    }

    fn check(&self, intent: &MoveIntent<'_>) -> Result<(), ScoutError> {
        match intent.destination() {
            Some(center) if intent.map.is_virtual_wall(center) => Err(ScoutError::UnsafeMove {
                movement: intent.movement,
                reason: format!("centre {center} is a virtual wall"),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridscout_perception::ArenaGeometry;
    use gridscout_types::Direction;

    fn open_map() -> GridMap {
        let mut map = GridMap::new(ArenaGeometry::default());
        map.mark_all_explored();
        map
    }

    fn intent(map: &GridMap, from: Pose, movement: Movement) -> MoveIntent<'_> {
        MoveIntent {
            map,
            from,
            movement,
        }
    }

    #[test]
    fn clear_forward_passes() {
        let map = open_map();
        let verifier = MoveVerifier::standard();
        let i = intent(&map, Pose::new(1, 1, Direction::North), Movement::Forward);
        assert!(verifier.verify(&i).is_ok());
        assert_eq!(i.destination(), Some(GridCoord::new(2, 1)));
    }

    #[test]
    fn turns_always_pass() {
        let map = open_map();
        let verifier = MoveVerifier::standard();
        for m in [Movement::TurnLeft, Movement::TurnRight, Movement::Calibrate] {
            let i = intent(&map, Pose::new(1, 1, Direction::South), m);
            assert!(verifier.verify(&i).is_ok());
            assert_eq!(i.destination(), None);
        }
    }

    #[test]
    fn leaving_the_arena_is_rejected() {
        let map = open_map();
        let rule = FootprintClearanceRule;
        let i = intent(&map, Pose::new(1, 1, Direction::West), Movement::Forward);
        let err = rule.check(&i).unwrap_err();
        assert!(err.to_string().contains("outside the arena"));
    }

    #[test]
    fn obstacle_in_footprint_is_rejected() {
        let mut map = open_map();
        map.set_obstacle(GridCoord::new(5, 6), true);
        let rule = FootprintClearanceRule;
        let i = intent(&map, Pose::new(3, 5, Direction::North), Movement::Forward);
        assert!(rule.check(&i).is_err());

        let i = intent(&map, Pose::new(2, 5, Direction::North), Movement::Forward);
        assert!(rule.check(&i).is_ok());
    }

    #[test]
    fn virtual_wall_centre_is_rejected() {
        let mut map = open_map();
        map.set_obstacle(GridCoord::new(6, 7), true);
        let rule = VirtualWallRule;
        let i = intent(&map, Pose::new(4, 6, Direction::North), Movement::Forward);
        assert!(matches!(
            rule.check(&i),
            Err(ScoutError::UnsafeMove {
                movement: Movement::Forward,
                ..
            })
        ));
    }

    #[test]
    fn empty_verifier_allows_everything() {
        let map = open_map();
        let i = intent(&map, Pose::new(1, 1, Direction::West), Movement::Forward);
        assert!(MoveVerifier::new().verify(&i).is_ok());
    }
}
