//! Arena grid partition and zone-to-region derivation.
//!
//! The arena is a cols×rows grid of square regions, each spanning a fixed
//! number of floor tiles. Region ids are row-major from the lower-left
//! corner. Zones arrive as two tile-coordinate corners and are normalized
//! before any region math.

use crate::config::NavConfig;
use crate::pose::Point;

pub type RegionId = usize;

/// Fixed geometry of the arena partition.
#[derive(Clone, Copy, Debug)]
pub struct ArenaGrid {
    pub cols: usize,
    pub rows: usize,
    pub tile_size: f32,
    pub tiles_per_region: usize,
}

impl ArenaGrid {
    pub fn from_nav(config: &NavConfig) -> Self {
        Self {
            cols: config.planner.cols,
            rows: config.planner.rows,
            tile_size: config.planner.tile_size,
            tiles_per_region: config.planner.tiles_per_region,
        }
    }

    pub fn region_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn col(&self, id: RegionId) -> usize {
        id % self.cols
    }

    pub fn row(&self, id: RegionId) -> usize {
        id / self.cols
    }

    /// Side length of one region in centimeters.
    pub fn region_size(&self) -> f32 {
        self.tile_size * self.tiles_per_region as f32
    }

    /// Lower-left corner of a region in centimeters.
    pub fn origin(&self, id: RegionId) -> Point {
        let size = self.region_size();
        Point::new(self.col(id) as f32 * size, self.row(id) as f32 * size)
    }

    pub fn center(&self, id: RegionId) -> Point {
        let origin = self.origin(id);
        let half = self.region_size() / 2.0;
        Point::new(origin.x + half, origin.y + half)
    }

    /// The two diagonal scan vantage points of a region: lower-left first,
    /// then upper-right, each pulled in from the corner by `inset` (a
    /// fraction of the region side).
    pub fn vantage_points(&self, id: RegionId, inset: f32) -> (Point, Point) {
        let origin = self.origin(id);
        let size = self.region_size();
        let near = inset * size;
        let far = (1.0 - inset) * size;
        (
            Point::new(origin.x + near, origin.y + near),
            Point::new(origin.x + far, origin.y + far),
        )
    }

    /// Tile extent of a region along one axis: `[lo, hi)` in tile units.
    fn tile_span(&self, index: usize) -> (i32, i32) {
        let lo = (index * self.tiles_per_region) as i32;
        (lo, lo + self.tiles_per_region as i32)
    }
}

/// A rectangle of the arena given in tile coordinates, corners normalized
/// so `min ≤ max` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Zone {
    pub fn new(corner_a: (i32, i32), corner_b: (i32, i32)) -> Self {
        Self {
            min_x: corner_a.0.min(corner_b.0),
            min_y: corner_a.1.min(corner_b.1),
            max_x: corner_a.0.max(corner_b.0),
            max_y: corner_a.1.max(corner_b.1),
        }
    }

    /// Corners packed as `[x1, y1, x2, y2]`, the configuration wire form.
    pub fn from_corners(corners: [i32; 4]) -> Self {
        Self::new((corners[0], corners[1]), (corners[2], corners[3]))
    }

    /// All regions whose tile rectangle overlaps this zone's interior.
    /// A zone that merely touches a region boundary does not claim it.
    pub fn regions(&self, grid: &ArenaGrid) -> Vec<RegionId> {
        let mut out = Vec::new();
        for id in 0..grid.region_count() {
            let (x_lo, x_hi) = grid.tile_span(grid.col(id));
            let (y_lo, y_hi) = grid.tile_span(grid.row(id));
            let x_overlaps = self.min_x < x_hi && x_lo < self.max_x;
            let y_overlaps = self.min_y < y_hi && y_lo < self.max_y;
            if x_overlaps && y_overlaps {
                out.push(id);
            }
        }
        out
    }

    /// Geometric center of the zone in centimeters. Deposit point for the
    /// goal zone.
    pub fn center(&self, grid: &ArenaGrid) -> Point {
        Point::new(
            (self.min_x + self.max_x) as f32 / 2.0 * grid.tile_size,
            (self.min_y + self.max_y) as f32 / 2.0 * grid.tile_size,
        )
    }
}
