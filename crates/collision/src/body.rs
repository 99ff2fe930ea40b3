//! Point-mass physics against a terrain mask.
//!
//! Bodies integrate with a fixed step on every peer; `dt` is measured in
//! fixed simulation ticks (1.0 per 50 ms step). Floating accumulation drift
//! within a turn is acceptable and corrected by authoritative state updates,
//! never by bit-exact cross-peer comparison.

use crate::mask::CollisionMask;
use manastorm_core::StateVec;
use thiserror::Error;
use tracing::trace;

/// Below this speed a body that has already touched terrain comes to rest
/// and stops producing contacts. Must exceed one tick of default gravity or
/// a grounded body would jitter forever.
pub const REST_EPSILON: f64 = 0.4;

/// Displacement cap in cells per tick; faster bodies are slowed to the cap
/// so sub-steps never exceed one cell.
const MAX_CELLS_PER_TICK: u32 = 64;

/// A state vector that cannot reconstruct a body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// The value array was shorter than the body requires.
    #[error("state vector too short: expected {expected}, got {got}")]
    TooShort {
        /// Number of values the body serializes.
        expected: usize,
        /// Number of values received.
        got: usize,
    },
}

fn take(data: &[f64], expected: usize) -> Result<&[f64], StateError> {
    if data.len() < expected {
        return Err(StateError::TooShort {
            expected,
            got: data.len(),
        });
    }
    Ok(data)
}

/// Tuning coefficients for a [`SimpleBody`].
#[derive(Debug, Clone, Copy)]
pub struct BodyDef {
    /// Velocity reflection factor on contact. Negative values bias toward
    /// embedding (explosive projectiles keep driving into the terrain).
    pub bounciness: f64,
    /// Per-tick velocity retention once the body has touched terrain.
    pub friction: f64,
    /// Downward acceleration per tick.
    pub gravity: f64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            bounciness: 0.0,
            friction: 1.0,
            gravity: 0.25,
        }
    }
}

/// Contact point produced by a physics step, in terrain world coordinates.
///
/// Returned from [`PhysicsBody::tick`] and consumed by the owning entity;
/// what to do about an exhausted bounce budget is caller policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    /// World x of the rejected position.
    pub x: i32,
    /// World y of the rejected position.
    pub y: i32,
}

/// Capability shared by everything damage/targeting code can push around,
/// whether it actually moves ([`SimpleBody`]) or not ([`StaticBody`]).
pub trait PhysicsBody {
    /// The body's shape mask.
    fn mask(&self) -> &'static CollisionMask;

    /// Sub-pixel position.
    fn precise_position(&self) -> (f64, f64);

    /// Position snapped to the collision grid.
    fn position(&self) -> (i32, i32) {
        let (x, y) = self.precise_position();
        (x.round() as i32, y.round() as i32)
    }

    /// Current velocity.
    fn velocity(&self) -> (f64, f64);

    /// Teleport to a precise position.
    fn move_to(&mut self, x: f64, y: f64);

    /// Add a velocity impulse.
    fn add_velocity(&mut self, dx: f64, dy: f64);

    /// Add an impulse of `power` along `direction` (radians) plus the
    /// matching spin.
    fn add_angular_velocity(&mut self, power: f64, direction: f64);

    /// Advance one step against `terrain`, returning the contact point if
    /// the body collided this tick.
    fn tick(&mut self, terrain: &CollisionMask, dt: f64) -> Option<Contact>;

    /// Simulation-relevant state as a compact value array.
    fn serialize(&self) -> StateVec;

    /// Restore state produced by [`serialize`](Self::serialize).
    fn deserialize(&mut self, data: &[f64]) -> Result<(), StateError>;
}

/// A free-moving point mass with a shape mask.
#[derive(Debug, Clone)]
pub struct SimpleBody {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    spin: f64,
    rotation: f64,
    contacted: bool,
    def: BodyDef,
    mask: &'static CollisionMask,
}

impl SimpleBody {
    /// Create a body with the given shape and coefficients at (0, 0).
    pub fn new(mask: &'static CollisionMask, def: BodyDef) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            spin: 0.0,
            rotation: 0.0,
            contacted: false,
            def,
            mask,
        }
    }

    /// Visual rotation accumulated from spin. Cosmetic, not serialized.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Whether the body has touched terrain since it was spawned or last
    /// deserialized into a free-flight state.
    pub fn contacted(&self) -> bool {
        self.contacted
    }

    fn speed_sq(&self) -> f64 {
        self.vx * self.vx + self.vy * self.vy
    }

    /// Reflect velocity about the contact normal, resolved per axis: if the
    /// x-only advance also collides the wall is vertical and `vx` reflects,
    /// if the y-only advance collides the surface is horizontal and `vy`
    /// reflects, a corner reflects both.
    fn reflect(&mut self, terrain: &CollisionMask, from: (f64, f64), to: (f64, f64)) {
        let hit_x = terrain.collides_with(self.mask, to.0.round() as i32, from.1.round() as i32);
        let hit_y = terrain.collides_with(self.mask, from.0.round() as i32, to.1.round() as i32);

        match (hit_x, hit_y) {
            (true, false) => self.vx = -self.vx * self.def.bounciness,
            (false, true) => self.vy = -self.vy * self.def.bounciness,
            _ => {
                self.vx = -self.vx * self.def.bounciness;
                self.vy = -self.vy * self.def.bounciness;
            }
        }
    }
}

impl PhysicsBody for SimpleBody {
    fn mask(&self) -> &'static CollisionMask {
        self.mask
    }

    fn precise_position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    fn add_velocity(&mut self, dx: f64, dy: f64) {
        self.vx += dx;
        self.vy += dy;
    }

    fn add_angular_velocity(&mut self, power: f64, direction: f64) {
        self.vx += direction.cos() * power;
        self.vy += direction.sin() * power;
        self.spin += power;
    }

    fn tick(&mut self, terrain: &CollisionMask, dt: f64) -> Option<Contact> {
        // A slow body rests only while terrain supports it one cell below;
        // at the apex of a bounce it keeps falling. Gravity is withheld at
        // rest so the body stops producing contacts, and an external impulse
        // resumes simulation.
        if self.contacted && self.speed_sq() < REST_EPSILON * REST_EPSILON {
            let (px, py) = self.position();
            if terrain.collides_with(self.mask, px, py + 1) {
                self.vx = 0.0;
                self.vy = 0.0;
                return None;
            }
        }

        self.vy += self.def.gravity * dt;
        if self.contacted {
            self.vx *= self.def.friction;
            self.vy *= self.def.friction;
        }
        self.rotation += self.spin * dt;

        let mut dx = self.vx * dt;
        let mut dy = self.vy * dt;
        let span = dx.abs().max(dy.abs());
        if span > f64::from(MAX_CELLS_PER_TICK) {
            let scale = f64::from(MAX_CELLS_PER_TICK) / span;
            dx *= scale;
            dy *= scale;
        }
        let steps = (dx.abs().max(dy.abs()).ceil() as u32).max(1);

        // Speculative advance in sub-steps of at most one cell; on overlap,
        // walk back to the last non-colliding offset along the velocity.
        let mut good = (self.x, self.y);
        for i in 1..=steps {
            let t = f64::from(i) / f64::from(steps);
            let candidate = (self.x + dx * t, self.y + dy * t);
            let (cx, cy) = (candidate.0.round() as i32, candidate.1.round() as i32);

            if terrain.collides_with(self.mask, cx, cy) {
                trace!(x = cx, y = cy, "body contact");
                self.reflect(terrain, good, candidate);
                self.x = good.0;
                self.y = good.1;
                self.contacted = true;
                return Some(Contact { x: cx, y: cy });
            }
            good = candidate;
        }

        self.x = good.0;
        self.y = good.1;
        None
    }

    fn serialize(&self) -> StateVec {
        vec![
            self.x,
            self.y,
            self.vx,
            self.vy,
            self.spin,
            f64::from(u8::from(self.contacted)),
        ]
    }

    fn deserialize(&mut self, data: &[f64]) -> Result<(), StateError> {
        let data = take(data, 6)?;
        self.x = data[0];
        self.y = data[1];
        self.vx = data[2];
        self.vy = data[3];
        self.spin = data[4];
        self.contacted = data[5] != 0.0;
        Ok(())
    }
}

/// An immovable terrain-anchored hit-target.
///
/// Exists so damage/targeting code can treat anchored set-pieces uniformly
/// with moving bodies through the same capability.
#[derive(Debug, Clone)]
pub struct StaticBody {
    x: f64,
    y: f64,
    mask: &'static CollisionMask,
}

impl StaticBody {
    /// Anchor a body of the given shape at a position.
    pub fn new(mask: &'static CollisionMask, x: f64, y: f64) -> Self {
        Self { x, y, mask }
    }
}

impl PhysicsBody for StaticBody {
    fn mask(&self) -> &'static CollisionMask {
        self.mask
    }

    fn precise_position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn velocity(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn move_to(&mut self, _x: f64, _y: f64) {}

    fn add_velocity(&mut self, _dx: f64, _dy: f64) {}

    fn add_angular_velocity(&mut self, _power: f64, _direction: f64) {}

    fn tick(&mut self, _terrain: &CollisionMask, _dt: f64) -> Option<Contact> {
        None
    }

    fn serialize(&self) -> StateVec {
        vec![self.x, self.y]
    }

    fn deserialize(&mut self, data: &[f64]) -> Result<(), StateError> {
        let data = take(data, 2)?;
        self.x = data[0];
        self.y = data[1];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamps;

    fn flat_floor() -> CollisionMask {
        // 128 wide, solid below y = 96.
        CollisionMask::from_fn(128, 128, |_, y| y >= 96)
    }

    fn dropped_body(def: BodyDef) -> SimpleBody {
        let mut body = SimpleBody::new(stamps::circle_3(), def);
        body.move_to(64.0, 10.0);
        body
    }

    #[test]
    fn body_falls_under_gravity() {
        let terrain = CollisionMask::empty(128, 128);
        let mut body = dropped_body(BodyDef::default());

        body.tick(&terrain, 1.0);
        body.tick(&terrain, 1.0);
        let (_, y) = body.precise_position();
        assert!(y > 10.0);
        let (_, vy) = body.velocity();
        assert!(vy > 0.0);
    }

    #[test]
    fn contact_reports_rejected_position_and_leaves_body_clear() {
        let terrain = flat_floor();
        let mut body = dropped_body(BodyDef {
            bounciness: 0.7,
            friction: 0.95,
            gravity: 0.25,
        });

        let contact = loop {
            if let Some(contact) = body.tick(&terrain, 1.0) {
                break contact;
            }
        };

        // The contact point overlaps terrain; the body itself was walked
        // back to a clear offset.
        assert!(terrain.collides_with(body.mask(), contact.x, contact.y));
        let (x, y) = body.position();
        assert!(!terrain.collides_with(body.mask(), x, y));
    }

    #[test]
    fn floor_contact_reflects_vertical_velocity() {
        let terrain = flat_floor();
        let mut body = dropped_body(BodyDef {
            bounciness: 0.7,
            friction: 0.95,
            gravity: 0.25,
        });

        loop {
            let (_, vy_before) = body.velocity();
            if body.tick(&terrain, 1.0).is_some() {
                let (_, vy_after) = body.velocity();
                assert!(vy_before > 0.0);
                assert!(vy_after < 0.0, "bounce should point up, got {vy_after}");
                assert!(vy_after.abs() < vy_before.abs());
                break;
            }
        }
    }

    #[test]
    fn negative_bounciness_keeps_driving_into_terrain() {
        let terrain = flat_floor();
        let mut body = dropped_body(BodyDef {
            bounciness: -0.9,
            friction: 0.96,
            gravity: 0.25,
        });

        loop {
            if body.tick(&terrain, 1.0).is_some() {
                let (_, vy) = body.velocity();
                assert!(vy > 0.0, "embedding body keeps its downward sign");
                break;
            }
        }
    }

    #[test]
    fn bounce_decay_comes_to_rest() {
        let terrain = flat_floor();
        let mut body = dropped_body(BodyDef {
            bounciness: 0.7,
            friction: 0.95,
            gravity: 0.25,
        });

        let mut impact_speeds = Vec::new();
        let mut last_contact_tick = 0u32;
        for tick in 0..2_000u32 {
            let (vx, vy) = body.velocity();
            if body.tick(&terrain, 1.0).is_some() {
                impact_speeds.push((vx * vx + vy * vy).sqrt());
                last_contact_tick = tick;
            }
        }

        assert!(impact_speeds.len() >= 2, "expected several bounces");
        for pair in impact_speeds.windows(2) {
            assert!(
                pair[1] <= pair[0] + 1e-9,
                "impact speed must decay: {pair:?}"
            );
        }
        // Contacts cease well before the run ends and the body rests.
        assert!(last_contact_tick < 1_000);
        let (vx, vy) = body.velocity();
        assert!(vx.hypot(vy) < REST_EPSILON);
    }

    #[test]
    fn fast_bodies_substep_instead_of_tunneling() {
        // A thin wall; a body moving 60 cells per tick must not pass it.
        let terrain = CollisionMask::from_fn(128, 128, |x, _| (60..64).contains(&x));
        let mut body = SimpleBody::new(
            stamps::circle_3(),
            BodyDef {
                bounciness: 0.5,
                friction: 1.0,
                gravity: 0.0,
            },
        );
        body.move_to(10.0, 64.0);
        body.add_velocity(60.0, 0.0);

        let contact = body.tick(&terrain, 1.0).expect("must hit the wall");
        assert!(contact.x <= 64);
        let (x, _) = body.position();
        assert!(x < 60, "body stopped before the wall, at {x}");
        let (vx, _) = body.velocity();
        assert!(vx < 0.0, "vx reflected off the vertical wall");
    }

    #[test]
    fn displacement_is_capped_for_extreme_velocities() {
        let open = CollisionMask::empty(256, 128);
        let mut body = SimpleBody::new(
            stamps::circle_3(),
            BodyDef {
                bounciness: 0.0,
                friction: 1.0,
                gravity: 0.0,
            },
        );
        body.move_to(10.0, 64.0);
        body.add_velocity(200.0, 0.0);
        body.tick(&open, 1.0);
        let (x, _) = body.precise_position();
        assert!(
            x - 10.0 <= f64::from(MAX_CELLS_PER_TICK) + 1e-9,
            "one tick advances at most the cap, got {x}"
        );

        // Even at that speed a wall inside the cap is still hit.
        let walled = CollisionMask::from_fn(256, 128, |x, _| (60..64).contains(&x));
        let mut fast = SimpleBody::new(
            stamps::circle_3(),
            BodyDef {
                bounciness: 0.5,
                friction: 1.0,
                gravity: 0.0,
            },
        );
        fast.move_to(10.0, 64.0);
        fast.add_velocity(200.0, 0.0);
        assert!(fast.tick(&walled, 1.0).is_some(), "wall within the cap is hit");
    }

    #[test]
    fn airborne_bodies_keep_falling_through_the_apex() {
        let terrain = flat_floor();
        let mut body = dropped_body(BodyDef {
            bounciness: 0.0,
            friction: 1.0,
            gravity: 0.25,
        });
        for _ in 0..200 {
            body.tick(&terrain, 1.0);
        }
        let (_, rest_y) = body.position();
        let (vx, vy) = body.velocity();
        assert!(vx.hypot(vy) < REST_EPSILON, "body settled on the floor");

        // Launch straight up; near the apex the speed dips below the rest
        // threshold with nothing underneath.
        body.add_velocity(0.0, -3.0);
        for _ in 0..200 {
            body.tick(&terrain, 1.0);
        }
        let (_, y) = body.position();
        assert_eq!(y, rest_y, "body came back down and re-rested");
        let (vx, vy) = body.velocity();
        assert!(vx.hypot(vy) < REST_EPSILON);
    }

    #[test]
    fn step_is_deterministic() {
        let run = || {
            let terrain = flat_floor();
            let mut body = dropped_body(BodyDef {
                bounciness: 0.7,
                friction: 0.95,
                gravity: 0.25,
            });
            body.add_velocity(1.3, 0.0);

            let mut trace = Vec::new();
            for tick in 0..400u32 {
                let contact = body.tick(&terrain, 1.0);
                trace.push((tick, body.position(), contact));
            }
            trace
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn serialize_round_trips_simulation_state() {
        let mut body = dropped_body(BodyDef::default());
        body.add_angular_velocity(2.0, 0.5);
        let terrain = flat_floor();
        for _ in 0..40 {
            body.tick(&terrain, 1.0);
        }

        let mut restored = SimpleBody::new(stamps::circle_3(), BodyDef::default());
        restored.deserialize(&body.serialize()).unwrap();

        assert_eq!(restored.precise_position(), body.precise_position());
        assert_eq!(restored.velocity(), body.velocity());
        assert_eq!(restored.contacted(), body.contacted());

        // Both resume identically.
        for _ in 0..40 {
            let a = body.tick(&terrain, 1.0);
            let b = restored.tick(&terrain, 1.0);
            assert_eq!(a, b);
            assert_eq!(body.precise_position(), restored.precise_position());
        }
    }

    #[test]
    fn short_state_vector_is_an_error() {
        let mut body = SimpleBody::new(stamps::circle_3(), BodyDef::default());
        let err = body.deserialize(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            StateError::TooShort {
                expected: 6,
                got: 2
            }
        );
    }

    #[test]
    fn static_body_never_moves() {
        let terrain = flat_floor();
        let mut body = StaticBody::new(stamps::character(), 40.0, 95.0);
        body.add_velocity(10.0, 10.0);
        body.move_to(0.0, 0.0);
        assert_eq!(body.tick(&terrain, 1.0), None);
        assert_eq!(body.precise_position(), (40.0, 95.0));
    }
}
