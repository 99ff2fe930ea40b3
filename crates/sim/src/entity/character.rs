//! Player-controlled wizards.

use crate::entity::Fate;
use crate::error::SimError;
use crate::world::World;
use manastorm_collision::{stamps, BodyDef, PhysicsBody, SimpleBody};
use manastorm_core::{InputState, StateVec};

/// Horizontal walk speed in cells per tick.
const WALK_SPEED: f64 = 1.2;

/// Upward jump impulse, applied only while grounded.
const JUMP_IMPULSE: f64 = 3.5;

/// Starting hit points.
pub(crate) const BASE_HP: f64 = 100.0;

/// A wizard owned by a player.
#[derive(Debug, Clone)]
pub struct Character {
    /// Index of the owning player in the roster.
    pub player: usize,
    /// Display name.
    pub name: String,
    /// Remaining hit points.
    pub hp: f64,
    body: SimpleBody,
}

impl Character {
    /// Create a character at a position.
    pub fn new(player: usize, name: impl Into<String>, x: f64, y: f64) -> Self {
        let mut body = SimpleBody::new(
            stamps::character(),
            BodyDef {
                bounciness: 0.0,
                friction: 1.0,
                gravity: 0.25,
            },
        );
        body.move_to(x, y);
        Self {
            player,
            name: name.into(),
            hp: BASE_HP,
            body,
        }
    }

    /// Placeholder used while reconstructing from a state vector.
    pub(crate) fn blank() -> Self {
        Self::new(0, "wizard", 0.0, 0.0)
    }

    /// The character's physics body.
    pub fn body(&self) -> &SimpleBody {
        &self.body
    }

    /// Mutable access to the physics body.
    pub fn body_mut(&mut self) -> &mut SimpleBody {
        &mut self.body
    }

    /// Apply one frame of controller state.
    pub fn control(&mut self, input: &InputState) {
        let (vx, _) = self.body.velocity();
        let target = f64::from(input.walk) * WALK_SPEED;
        self.body.add_velocity(target - vx, 0.0);

        if input.jump && self.body.contacted() {
            self.body.add_velocity(0.0, -JUMP_IMPULSE);
        }
    }

    /// Advance one fixed step.
    pub fn tick(&mut self, world: &mut World, dt: f64) -> Fate {
        if self.hp <= 0.0 {
            return Fate::Dead;
        }
        self.body.tick(world.terrain(), dt);
        if world.below_kill_plane(self.body.position().1) {
            self.hp = 0.0;
            return Fate::Dead;
        }
        Fate::Alive
    }

    /// player, hp, then body state.
    pub fn serialize(&self) -> StateVec {
        let mut data = vec![self.player as f64, self.hp];
        data.extend(self.body.serialize());
        data
    }

    /// Restore state produced by [`serialize`](Self::serialize).
    pub fn deserialize(&mut self, data: &[f64]) -> Result<(), SimError> {
        if data.len() < 2 {
            return Err(manastorm_collision::StateError::TooShort {
                expected: 2,
                got: data.len(),
            }
            .into());
        }
        self.player = data[0] as usize;
        self.hp = data[1];
        self.body.deserialize(&data[2..])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manastorm_collision::CollisionMask;

    fn grounded_character() -> (World, Character) {
        let terrain = CollisionMask::from_fn(64, 64, |_, y| y >= 40);
        let world = World::new(terrain);
        let mut character = Character::new(0, "merlin", 20.0, 33.0);
        // Settle onto the floor so jumping is allowed.
        let mut world = world;
        for _ in 0..20 {
            character.tick(&mut world, 1.0);
        }
        (world, character)
    }

    #[test]
    fn walk_input_moves_horizontally() {
        let (mut world, mut character) = grounded_character();
        let (x0, _) = character.body().position();

        for _ in 0..10 {
            character.control(&InputState {
                walk: 1,
                ..InputState::default()
            });
            character.tick(&mut world, 1.0);
        }
        let (x1, _) = character.body().position();
        assert!(x1 > x0);
    }

    #[test]
    fn jump_requires_ground_contact() {
        let (mut world, mut character) = grounded_character();
        character.control(&InputState {
            jump: true,
            ..InputState::default()
        });
        let (_, vy) = character.body().velocity();
        assert!(vy < 0.0, "grounded character jumps");

        // Airborne the same frame; no double jump until it lands again.
        character.tick(&mut world, 1.0);
        let mut airborne = Character::new(0, "hovering", 20.0, 5.0);
        airborne.control(&InputState {
            jump: true,
            ..InputState::default()
        });
        let (_, vy) = airborne.body().velocity();
        assert_eq!(vy, 0.0);
    }

    #[test]
    fn depleted_hp_is_fatal() {
        let (mut world, mut character) = grounded_character();
        character.hp = 0.0;
        assert_eq!(character.tick(&mut world, 1.0), Fate::Dead);
    }

    #[test]
    fn state_round_trip() {
        let (mut world, mut character) = grounded_character();
        character.hp = 62.5;
        character.tick(&mut world, 1.0);

        let mut restored = Character::blank();
        restored.deserialize(&character.serialize()).unwrap();
        assert_eq!(restored.hp, 62.5);
        assert_eq!(
            restored.body().precise_position(),
            character.body().precise_position()
        );
    }
}
