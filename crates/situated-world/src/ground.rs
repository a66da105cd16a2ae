//! Ground providers: the terrain under a place.
//!
//! A [`Ground`] answers height, traversability, and potential-field queries
//! at a ground-plane coordinate. The simulation core only reads ground; a
//! place owns its provider outright and never mutates it during a tick.
//!
//! Two providers ship with the crate:
//!
//! - [`FlatGround`] -- constant height over a rectangular area.
//! - [`HeightmapGround`] -- a regular grid of heights where `NaN` cells are
//!   holes. Attraction follows the downhill slope and repulsion pushes away
//!   from neighbouring holes and from the grid border.

use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use situated_types::{Aabb, Dim2, Point, Vector2};

use crate::error::GroundError;

/// Read-only terrain queried by places, perception, and solvers.
pub trait Ground: Debug + Send + Sync {
    /// Ground height at `(x, y)`, or `NaN` where the ground is undefined.
    fn height_at(&self, x: f64, y: f64) -> f64;

    /// Whether a body may stand at `(x, y)`.
    fn is_traversable(&self, x: f64, y: f64) -> bool;

    /// Attraction potential at `(x, y)`.
    fn attraction_at(&self, x: f64, y: f64) -> Vector2;

    /// Repulsion potential at `(x, y)`.
    fn repulsion_at(&self, x: f64, y: f64) -> Vector2;
}

// ---------------------------------------------------------------------------
// Flat ground
// ---------------------------------------------------------------------------

/// Constant-height ground over a rectangular area.
///
/// Outside the area the height is `NaN` and nothing is traversable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatGround {
    /// Height of the surface.
    height: f64,
    /// Area covered by the surface.
    area: Aabb<Dim2>,
}

impl FlatGround {
    /// Create a flat surface at `height` covering `area`.
    pub const fn new(height: f64, area: Aabb<Dim2>) -> Self {
        Self { height, area }
    }

    /// A flat surface covering the whole plane.
    pub const fn unbounded(height: f64) -> Self {
        Self::new(
            height,
            Aabb {
                min: Point::new([f64::NEG_INFINITY, f64::NEG_INFINITY]),
                max: Point::new([f64::INFINITY, f64::INFINITY]),
            },
        )
    }

    /// Height of the surface.
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Area covered by the surface.
    pub const fn area(&self) -> &Aabb<Dim2> {
        &self.area
    }
}

impl Ground for FlatGround {
    fn height_at(&self, x: f64, y: f64) -> f64 {
        if self.is_traversable(x, y) {
            self.height
        } else {
            f64::NAN
        }
    }

    fn is_traversable(&self, x: f64, y: f64) -> bool {
        self.area.contains_point(&Point::new([x, y]))
    }

    fn attraction_at(&self, _x: f64, _y: f64) -> Vector2 {
        Vector2::ZERO
    }

    fn repulsion_at(&self, _x: f64, _y: f64) -> Vector2 {
        Vector2::ZERO
    }
}

// ---------------------------------------------------------------------------
// Heightmap ground
// ---------------------------------------------------------------------------

/// Offsets of the eight neighbouring cells.
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Ground sampled on a regular grid.
///
/// Cell `(column, row)` covers
/// `[origin.x + column * cell_size, origin.x + (column + 1) * cell_size)`
/// along x and the equivalent range along y. A `NaN` height marks a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightmapGround {
    /// Ground-plane coordinate of the lower corner of cell `(0, 0)`.
    origin: (f64, f64),
    /// Side length of one square cell.
    cell_size: f64,
    /// Number of cells along x.
    columns: usize,
    /// Number of cells along y.
    rows: usize,
    /// Row-major heights.
    heights: Vec<f64>,
}

impl HeightmapGround {
    /// Build a heightmap from rows of heights (row 0 is the lowest y).
    ///
    /// # Errors
    ///
    /// Returns [`GroundError`] if the grid is empty or ragged, or if the
    /// cell size is not a positive finite number.
    pub fn new(origin: (f64, f64), cell_size: f64, rows: &[Vec<f64>]) -> Result<Self, GroundError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GroundError::InvalidCellSize(cell_size));
        }
        let columns = rows.first().map_or(0, Vec::len);
        if columns == 0 {
            return Err(GroundError::EmptyGrid);
        }
        let mut heights = Vec::with_capacity(columns.saturating_mul(rows.len()));
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns {
                return Err(GroundError::RaggedGrid {
                    row,
                    expected: columns,
                    found: cells.len(),
                });
            }
            heights.extend_from_slice(cells);
        }
        Ok(Self {
            origin,
            cell_size,
            columns,
            rows: rows.len(),
            heights,
        })
    }

    /// Area covered by the grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn area(&self) -> Aabb<Dim2> {
        let (ox, oy) = self.origin;
        Aabb::new(
            Point::new([ox, oy]),
            Point::new([
                ox + self.columns as f64 * self.cell_size,
                oy + self.rows as f64 * self.cell_size,
            ]),
        )
    }

    /// Cell containing `(x, y)`, if inside the grid.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let column = ((x - self.origin.0) / self.cell_size).floor();
        let row = ((y - self.origin.1) / self.cell_size).floor();
        if !column.is_finite() || !row.is_finite() || column < 0.0 || row < 0.0 {
            return None;
        }
        let (column, row) = (column as usize, row as usize);
        (column < self.columns && row < self.rows).then_some((column, row))
    }

    /// Height stored in a cell; `NaN` outside the grid.
    fn cell_height(&self, column: usize, row: usize) -> f64 {
        if column >= self.columns {
            return f64::NAN;
        }
        row.checked_mul(self.columns)
            .and_then(|base| base.checked_add(column))
            .and_then(|index| self.heights.get(index))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Height of the neighbour at offset `(dx, dy)`; `NaN` outside the grid.
    fn neighbour_height(&self, column: usize, row: usize, dx: isize, dy: isize) -> f64 {
        match (column.checked_add_signed(dx), row.checked_add_signed(dy)) {
            (Some(c), Some(r)) => self.cell_height(c, r),
            _ => f64::NAN,
        }
    }

    /// Slope along one axis by finite differences, skipping holes.
    fn slope(&self, column: usize, row: usize, (dx, dy): (isize, isize)) -> f64 {
        let here = self.cell_height(column, row);
        let ahead = self.neighbour_height(column, row, dx, dy);
        let behind = self.neighbour_height(column, row, -dx, -dy);
        match (ahead.is_nan(), behind.is_nan()) {
            (false, false) => (ahead - behind) / (2.0 * self.cell_size),
            (false, true) => (ahead - here) / self.cell_size,
            (true, false) => (here - behind) / self.cell_size,
            (true, true) => 0.0,
        }
    }
}

impl Ground for HeightmapGround {
    fn height_at(&self, x: f64, y: f64) -> f64 {
        self.cell(x, y)
            .map_or(f64::NAN, |(column, row)| self.cell_height(column, row))
    }

    fn is_traversable(&self, x: f64, y: f64) -> bool {
        !self.height_at(x, y).is_nan()
    }

    /// Downhill direction, scaled by the slope.
    fn attraction_at(&self, x: f64, y: f64) -> Vector2 {
        let Some((column, row)) = self.cell(x, y) else {
            return Vector2::ZERO;
        };
        if self.cell_height(column, row).is_nan() {
            return Vector2::ZERO;
        }
        Vector2::new(
            -self.slope(column, row, (1, 0)),
            -self.slope(column, row, (0, 1)),
        )
    }

    /// Unit vector pointing away from the blocked neighbour cells.
    #[allow(clippy::cast_precision_loss)]
    fn repulsion_at(&self, x: f64, y: f64) -> Vector2 {
        let Some((column, row)) = self.cell(x, y) else {
            return Vector2::ZERO;
        };
        NEIGHBOURS
            .iter()
            .filter(|(dx, dy)| self.neighbour_height(column, row, *dx, *dy).is_nan())
            .fold(Vector2::ZERO, |acc, (dx, dy)| {
                acc.add(&Vector2::new(-(*dx as f64), -(*dy as f64)).normalized())
            })
            .normalized()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn slope_map() -> HeightmapGround {
        // Heights rise with x; one hole at column 2 of the top row.
        HeightmapGround::new(
            (0.0, 0.0),
            1.0,
            &[
                vec![0.0, 1.0, 2.0],
                vec![0.0, 1.0, 2.0],
                vec![0.0, 1.0, f64::NAN],
            ],
        )
        .unwrap()
    }

    #[test]
    fn flat_ground_is_bounded() {
        let ground = FlatGround::new(
            2.0,
            Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 10.0])),
        );
        assert_eq!(ground.height_at(5.0, 5.0), 2.0);
        assert!(ground.is_traversable(10.0, 0.0));
        assert!(!ground.is_traversable(11.0, 0.0));
        assert!(ground.height_at(11.0, 0.0).is_nan());
        assert!(FlatGround::unbounded(0.0).is_traversable(1e9, -1e9));
    }

    #[test]
    fn heightmap_lookup_and_holes() {
        let map = slope_map();
        assert_eq!(map.height_at(1.5, 0.5), 1.0);
        assert!(map.is_traversable(0.2, 2.9));
        assert!(!map.is_traversable(2.5, 2.5));
        assert!(!map.is_traversable(-0.1, 0.0));
        assert!(!map.is_traversable(3.0, 0.0));
        assert_eq!(map.area().max.coords, [3.0, 3.0]);
    }

    #[test]
    fn attraction_points_downhill() {
        let map = slope_map();
        let force = map.attraction_at(1.5, 0.5);
        assert_eq!(force, Vector2::new(-1.0, 0.0));
        assert_eq!(map.attraction_at(2.5, 2.5), Vector2::ZERO);
    }

    #[test]
    fn repulsion_points_away_from_hole() {
        let map = slope_map();
        // The hole is the upper-right neighbour of the centre cell, and
        // nothing else around the centre is blocked.
        let force = map.repulsion_at(1.5, 1.5);
        assert!(force.x < 0.0 && force.y < 0.0);
        assert!((force.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(matches!(
            HeightmapGround::new((0.0, 0.0), 1.0, &[]),
            Err(GroundError::EmptyGrid)
        ));
        assert!(matches!(
            HeightmapGround::new((0.0, 0.0), 1.0, &[vec![0.0, 0.0], vec![0.0]]),
            Err(GroundError::RaggedGrid { row: 1, .. })
        ));
        assert!(matches!(
            HeightmapGround::new((0.0, 0.0), 0.0, &[vec![0.0]]),
            Err(GroundError::InvalidCellSize(_))
        ));
    }
}
