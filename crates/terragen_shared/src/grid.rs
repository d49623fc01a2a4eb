//! Grid coordinates and axis-aligned boxes.
//!
//! A `GridCoord` names one terrain tile; an `Aabb` is the volume used to find
//! foliage instances belonging to a tile.

use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec3};

/// Integer tile-grid index.
///
/// Ordered (row-major on `x`, then `y`) so maps keyed by it iterate in a
/// stable order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridCoord {
    /// X index
    pub x: i32,
    /// Y index
    pub y: i32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid origin.
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Snaps a world position to the nearest grid index for cells of `span`.
    #[inline]
    #[must_use]
    pub fn from_world_rounded(position: Vec2, span: Vec2) -> Self {
        Self::new(
            (position.x / span.x).round() as i32,
            (position.y / span.y).round() as i32,
        )
    }

    /// Offsets by whole cells.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// True when the coordinates differ by one in exactly one axis.
    #[inline]
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx + dy == 1
    }

    /// Chessboard distance in cells.
    #[inline]
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Returns true if the point lies inside or on the boundary.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns true if the boxes overlap (touching counts).
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}
