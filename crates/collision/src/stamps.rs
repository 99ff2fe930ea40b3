//! Precomputed stamp shapes.
//!
//! Stamps are fixed shapes sized once at startup; runtime only looks them
//! up, never rasterizes new ones. Circles carve craters and act as
//! projectile hitboxes, the sword tip is both a hitbox and a shaped damage
//! region.

use crate::mask::CollisionMask;
use std::sync::OnceLock;

fn circle(diameter: u32) -> CollisionMask {
    let r = diameter as f64 / 2.0;
    CollisionMask::from_fn(diameter, diameter, |x, y| {
        let dx = x as f64 + 0.5 - r;
        let dy = y as f64 + 0.5 - r;
        dx * dx + dy * dy <= r * r
    })
}

/// 3x3 circle, the fireball hitbox.
pub fn circle_3() -> &'static CollisionMask {
    static MASK: OnceLock<CollisionMask> = OnceLock::new();
    MASK.get_or_init(|| circle(3))
}

/// 9x9 circle, the small crater a fireball leaves per bounce.
pub fn circle_9() -> &'static CollisionMask {
    static MASK: OnceLock<CollisionMask> = OnceLock::new();
    MASK.get_or_init(|| circle(9))
}

/// 32x32 circle, the explosion crater.
pub fn circle_32() -> &'static CollisionMask {
    static MASK: OnceLock<CollisionMask> = OnceLock::new();
    MASK.get_or_init(|| circle(32))
}

/// Downward-pointing sword tip: full width at the top row, tapering to a
/// single cell at the bottom.
pub fn sword_tip() -> &'static CollisionMask {
    static MASK: OnceLock<CollisionMask> = OnceLock::new();
    MASK.get_or_init(|| {
        const WIDTH: u32 = 9;
        const HEIGHT: u32 = 12;
        CollisionMask::from_fn(WIDTH, HEIGHT, |x, y| {
            let half = (WIDTH / 2) as i64;
            let dx = (x as i64 - half).abs();
            // Taper linearly toward the apex on the last row.
            dx * (HEIGHT as i64 - 1) <= (HEIGHT as i64 - 1 - y as i64) * half
        })
    })
}

/// 5x7 capsule-ish box, the character hitbox.
pub fn character() -> &'static CollisionMask {
    static MASK: OnceLock<CollisionMask> = OnceLock::new();
    MASK.get_or_init(|| CollisionMask::from_fn(5, 7, |_, _| true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circles_are_symmetric_and_bounded() {
        for mask in [circle_3(), circle_9(), circle_32()] {
            let d = mask.width();
            assert_eq!(mask.width(), mask.height());
            for y in 0..d {
                for x in 0..d {
                    assert_eq!(
                        mask.get(x, y),
                        mask.get(d - 1 - x, y),
                        "horizontal asymmetry in circle {d} at ({x}, {y})"
                    );
                    assert_eq!(mask.get(x, y), mask.get(x, d - 1 - y));
                }
            }
        }
    }

    #[test]
    fn circle_32_covers_most_of_its_box() {
        // pi/4 of the bounding box, within rasterization slack.
        let cells = circle_32().occupied_cells() as f64;
        let ratio = cells / (32.0 * 32.0);
        assert!((0.72..0.85).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn sword_tip_tapers_to_a_point() {
        let tip = sword_tip();
        let top: usize = (0..tip.width()).filter(|&x| tip.get(x, 0)).count();
        let bottom: usize = (0..tip.width())
            .filter(|&x| tip.get(x, tip.height() - 1))
            .count();
        assert!(top > bottom);
        assert_eq!(bottom, 1);
    }

    #[test]
    fn stamps_are_shared_instances() {
        assert!(std::ptr::eq(circle_9(), circle_9()));
    }
}
