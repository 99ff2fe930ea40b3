//! Controller state as it crosses the wire.
//!
//! Input-device polling is a collaborator concern; the simulation only sees
//! this serialized snapshot, forwarded by clients and applied by the host to
//! the active character.

use serde::{Deserialize, Serialize};

/// One frame of controller state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputState {
    /// Walk direction: -1 left, 0 idle, 1 right.
    pub walk: i8,
    /// Jump pressed this frame.
    pub jump: bool,
    /// Cast/fire pressed this frame.
    pub fire: bool,
    /// Aim direction in radians.
    pub aim_direction: f64,
    /// Charge power, 0.0 to 1.0.
    pub aim_power: f64,
}

impl InputState {
    /// Clamp remote-supplied values into their legal ranges.
    pub fn sanitized(mut self) -> Self {
        self.walk = self.walk.clamp(-1, 1);
        // clamp passes NaN through, so non-finite power is zeroed first.
        if !self.aim_power.is_finite() {
            self.aim_power = 0.0;
        }
        self.aim_power = self.aim_power.clamp(0.0, 1.0);
        if !self.aim_direction.is_finite() {
            self.aim_direction = 0.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_hostile_values() {
        let input = InputState {
            walk: 7,
            jump: false,
            fire: true,
            aim_direction: f64::NAN,
            aim_power: 42.0,
        }
        .sanitized();

        assert_eq!(input.walk, 1);
        assert_eq!(input.aim_direction, 0.0);
        assert_eq!(input.aim_power, 1.0);
    }

    #[test]
    fn non_finite_power_is_zeroed() {
        let nan = InputState {
            aim_power: f64::NAN,
            ..InputState::default()
        }
        .sanitized();
        assert_eq!(nan.aim_power, 0.0);

        let infinite = InputState {
            aim_power: f64::INFINITY,
            ..InputState::default()
        }
        .sanitized();
        assert_eq!(infinite.aim_power, 0.0);
    }
}
