//! Dense occupancy grids for terrain and shape stamps.

use serde::{Deserialize, Serialize};

/// A bitmap over a coordinate grid answering overlap queries and supporting
/// destructive terrain edits.
///
/// Cell coordinates are always grid-local; world-space queries pass through
/// the origin offset first. The terrain mask is created once at level load
/// and mutated in place for the level's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionMask {
    width: u32,
    height: u32,
    /// Grid-to-world translation of the origin cell.
    offset_x: i32,
    offset_y: i32,
    /// Row-major occupancy bits, one `u64` word per 64 columns.
    words: Vec<u64>,
    words_per_row: u32,
}

impl CollisionMask {
    /// Create an empty mask of the given dimensions at offset (0, 0).
    pub fn empty(width: u32, height: u32) -> Self {
        let words_per_row = width.div_ceil(64);
        Self {
            width,
            height,
            offset_x: 0,
            offset_y: 0,
            words: vec![0; (words_per_row * height) as usize],
            words_per_row,
        }
    }

    /// Create a fully occupied mask of the given dimensions.
    pub fn filled(width: u32, height: u32) -> Self {
        let mut mask = Self::empty(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, true);
            }
        }
        mask
    }

    /// Create a mask from a per-cell predicate.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::empty(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    /// Set the grid-to-world origin offset.
    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Grid width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> (usize, u64) {
        let word = (y * self.words_per_row + x / 64) as usize;
        (word, 1u64 << (x % 64))
    }

    /// Whether the grid-local cell is occupied. Out-of-range cells are empty.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (word, bit) = self.index(x, y);
        self.words[word] & bit != 0
    }

    fn set(&mut self, x: u32, y: u32, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (word, bit) = self.index(x, y);
        if value {
            self.words[word] |= bit;
        } else {
            self.words[word] &= !bit;
        }
    }

    /// Whether the world-space point lies on an occupied cell.
    pub fn collides_with_point(&self, x: i32, y: i32) -> bool {
        let gx = x - self.offset_x;
        let gy = y - self.offset_y;
        if gx < 0 || gy < 0 {
            return false;
        }
        self.get(gx as u32, gy as u32)
    }

    /// Test whether `other`, placed with its origin at world coordinates
    /// `(x, y)`, overlaps any occupied cell of this mask.
    ///
    /// Bounding-box rejection first, then cell-by-cell intersection over the
    /// overlap region only.
    pub fn collides_with(&self, other: &CollisionMask, x: i32, y: i32) -> bool {
        // Other's bounds in this mask's grid space.
        let ox = x - self.offset_x;
        let oy = y - self.offset_y;

        if ox >= self.width as i32
            || oy >= self.height as i32
            || ox + other.width as i32 <= 0
            || oy + other.height as i32 <= 0
        {
            return false;
        }

        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + other.width as i32).min(self.width as i32);
        let y1 = (oy + other.height as i32).min(self.height as i32);

        for gy in y0..y1 {
            for gx in x0..x1 {
                if self.get(gx as u32, gy as u32)
                    && other.get((gx - ox) as u32, (gy - oy) as u32)
                {
                    return true;
                }
            }
        }
        false
    }

    /// Clear every cell covered by `stamp` centered at world `(x, y)`.
    ///
    /// `radius` is the stamp's half-extent, so the stamp's origin lands at
    /// `(x - radius, y - radius)`. A pure set-difference: subtracting the
    /// same stamp twice has no additional effect, and writes outside the
    /// allocated bounds are clipped, never errors.
    pub fn subtract(&mut self, x: i32, y: i32, radius: i32, stamp: &CollisionMask) {
        let ox = x - radius - self.offset_x;
        let oy = y - radius - self.offset_y;

        for sy in 0..stamp.height {
            for sx in 0..stamp.width {
                if !stamp.get(sx, sy) {
                    continue;
                }
                let gx = ox + sx as i32;
                let gy = oy + sy as i32;
                if gx >= 0 && gy >= 0 {
                    self.set(gx as u32, gy as u32, false);
                }
            }
        }
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_cells_are_empty() {
        let mask = CollisionMask::filled(4, 4);
        assert!(mask.get(3, 3));
        assert!(!mask.get(4, 3));
        assert!(!mask.get(3, 4));
    }

    #[test]
    fn bounding_box_rejection() {
        let a = CollisionMask::filled(8, 8);
        let b = CollisionMask::filled(4, 4);
        assert!(!a.collides_with(&b, 8, 0));
        assert!(!a.collides_with(&b, 0, -4));
        assert!(a.collides_with(&b, 7, 7));
    }

    #[test]
    fn overlap_requires_occupied_cells_on_both_sides() {
        // A mask occupied only on its left half never overlaps a probe
        // placed over its right half.
        let a = CollisionMask::from_fn(8, 8, |x, _| x < 4);
        let probe = CollisionMask::filled(2, 2);
        assert!(a.collides_with(&probe, 0, 0));
        assert!(!a.collides_with(&probe, 5, 5));
    }

    #[test]
    fn collision_is_symmetric() {
        let a = CollisionMask::from_fn(8, 8, |x, y| (x + y) % 3 == 0);
        let b = CollisionMask::from_fn(5, 5, |x, y| x == y);
        for x in -6..10 {
            for y in -6..10 {
                // Placing b relative to a agrees with the roles swapped and
                // the coordinates inverted.
                assert_eq!(
                    a.collides_with(&b, x, y),
                    b.collides_with(&a, -x, -y),
                    "asymmetry at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn offset_translates_world_queries() {
        let terrain = CollisionMask::filled(8, 8).with_offset(100, 200);
        let probe = CollisionMask::filled(1, 1);
        assert!(terrain.collides_with(&probe, 100, 200));
        assert!(terrain.collides_with_point(107, 207));
        assert!(!terrain.collides_with(&probe, 0, 0));
        assert!(!terrain.collides_with_point(108, 207));
    }

    #[test]
    fn subtract_is_idempotent_and_clipped() {
        let stamp = CollisionMask::from_fn(4, 4, |_, _| true);
        let mut terrain = CollisionMask::filled(8, 8);

        // Stamp centered near the corner; the out-of-range part is clipped.
        terrain.subtract(0, 0, 2, &stamp);
        let after_once = terrain.clone();
        assert_eq!(terrain.occupied_cells(), 64 - 4);

        terrain.subtract(0, 0, 2, &stamp);
        assert_eq!(terrain, after_once);
    }

    #[test]
    fn wide_masks_span_word_boundaries() {
        let mask = CollisionMask::filled(130, 2);
        assert_eq!(mask.occupied_cells(), 260);
        assert!(mask.get(129, 1));
        assert!(!mask.get(130, 1));
    }
}
