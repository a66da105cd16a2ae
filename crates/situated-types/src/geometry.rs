//! Dimension-generic geometry: points, axis-aligned bounds, and positions.
//!
//! Dimensionality is a type parameter, never a runtime branch. Each
//! dimension marker ([`Dim1`], [`Dim1_5`], [`Dim2`], [`Dim3`]) implements
//! [`Dimension`], which fixes the coordinate storage and provides the few
//! dimension-specific projections the simulation needs: the ground
//! footprint of a coordinate, its height (3D only), and a rotation in the
//! ground plane.
//!
//! All other geometry is written once against the coordinate slice exposed
//! by `AsRef<[f64]>`.

use core::fmt::Debug;
use core::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A spatial dimension capability.
///
/// Implemented by zero-sized marker types. The simulation core is generic
/// over `D: Dimension` and never inspects the axis count at runtime except
/// through the coordinate slice.
pub trait Dimension:
    Copy + Clone + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static
{
    /// Number of coordinate axes.
    const AXES: usize;

    /// Human-readable name of the dimension (for logs).
    const NAME: &'static str;

    /// Fixed-size coordinate storage (`[f64; AXES]`).
    type Coords: Copy
        + Debug
        + Default
        + PartialEq
        + Send
        + Sync
        + AsRef<[f64]>
        + AsMut<[f64]>
        + Serialize
        + DeserializeOwned
        + 'static;

    /// Project a coordinate onto the ground plane, returning `(x, y)`.
    fn footprint(coords: &Self::Coords) -> (f64, f64);

    /// Height of a coordinate above the ground plane, if the dimension has one.
    fn height(_coords: &Self::Coords) -> Option<f64> {
        None
    }

    /// Return a copy of `coords` with its height replaced.
    ///
    /// Dimensions without a vertical axis return the coordinate unchanged.
    fn with_height(coords: Self::Coords, _height: f64) -> Self::Coords {
        coords
    }

    /// Rotate a coordinate (interpreted as an offset) by `angle` radians in
    /// the ground plane.
    fn rotate_xy(coords: Self::Coords, _angle: f64) -> Self::Coords {
        coords
    }
}

/// One-dimensional line world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim1;

/// Road-network world: a curvilinear abscissa along a segment plus a
/// lateral (jutting) offset from the segment axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim1_5;

/// Planar world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim2;

/// Volumetric world; the third axis is the height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim3;

impl Dimension for Dim1 {
    const AXES: usize = 1;
    const NAME: &'static str = "1D";
    type Coords = [f64; 1];

    fn footprint(coords: &Self::Coords) -> (f64, f64) {
        (coords[0], 0.0)
    }
}

impl Dimension for Dim1_5 {
    const AXES: usize = 2;
    const NAME: &'static str = "1.5D";
    type Coords = [f64; 2];

    fn footprint(coords: &Self::Coords) -> (f64, f64) {
        (coords[0], coords[1])
    }
}

impl Dimension for Dim2 {
    const AXES: usize = 2;
    const NAME: &'static str = "2D";
    type Coords = [f64; 2];

    fn footprint(coords: &Self::Coords) -> (f64, f64) {
        (coords[0], coords[1])
    }

    fn rotate_xy(coords: Self::Coords, angle: f64) -> Self::Coords {
        let (x, y) = rotate(coords[0], coords[1], angle);
        [x, y]
    }
}

impl Dimension for Dim3 {
    const AXES: usize = 3;
    const NAME: &'static str = "3D";
    type Coords = [f64; 3];

    fn footprint(coords: &Self::Coords) -> (f64, f64) {
        (coords[0], coords[1])
    }

    fn height(coords: &Self::Coords) -> Option<f64> {
        Some(coords[2])
    }

    fn with_height(coords: Self::Coords, height: f64) -> Self::Coords {
        [coords[0], coords[1], height]
    }

    fn rotate_xy(coords: Self::Coords, angle: f64) -> Self::Coords {
        let (x, y) = rotate(coords[0], coords[1], angle);
        [x, y, coords[2]]
    }
}

fn rotate(x: f64, y: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

// ---------------------------------------------------------------------------
// Coordinate helpers
// ---------------------------------------------------------------------------

/// Combine two coordinates axis by axis.
pub fn zip_coords<D: Dimension>(
    a: &D::Coords,
    b: &D::Coords,
    f: impl Fn(f64, f64) -> f64,
) -> D::Coords {
    let mut out = D::Coords::default();
    for ((o, x), y) in out.as_mut().iter_mut().zip(a.as_ref()).zip(b.as_ref()) {
        *o = f(*x, *y);
    }
    out
}

/// Apply `f` to every axis of a coordinate.
pub fn map_coords<D: Dimension>(a: &D::Coords, f: impl Fn(f64) -> f64) -> D::Coords {
    let mut out = D::Coords::default();
    for (o, x) in out.as_mut().iter_mut().zip(a.as_ref()) {
        *o = f(*x);
    }
    out
}

/// Euclidean norm of a coordinate interpreted as a vector.
pub fn norm<D: Dimension>(a: &D::Coords) -> f64 {
    a.as_ref().iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Scale a coordinate interpreted as a vector.
pub fn scale<D: Dimension>(a: &D::Coords, factor: f64) -> D::Coords {
    map_coords::<D>(a, |v| v * factor)
}

/// Rescale a vector so its norm does not exceed `max_norm`.
///
/// A non-finite or negative `max_norm` leaves the vector untouched.
pub fn clamp_norm<D: Dimension>(a: &D::Coords, max_norm: f64) -> D::Coords {
    let length = norm::<D>(a);
    if !max_norm.is_finite() || max_norm < 0.0 || length <= max_norm || length <= 0.0 {
        return *a;
    }
    scale::<D>(a, max_norm / length)
}

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A point in a `D`-dimensional world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<D: Dimension> {
    /// The coordinate values.
    pub coords: D::Coords,
}

impl<D: Dimension> Point<D> {
    /// Create a point from raw coordinates.
    pub const fn new(coords: D::Coords) -> Self {
        Self { coords }
    }

    /// The origin.
    pub fn origin() -> Self {
        Self::default()
    }

    /// Coordinate along `axis`, or `0.0` if the axis does not exist.
    pub fn axis(&self, axis: usize) -> f64 {
        self.coords.as_ref().get(axis).copied().unwrap_or(0.0)
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: &Self) -> f64 {
        self.coords
            .as_ref()
            .iter()
            .zip(other.coords.as_ref())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Translate the point by an offset vector.
    pub fn translated(&self, offset: &D::Coords) -> Self {
        Self::new(zip_coords::<D>(&self.coords, offset, |a, b| a + b))
    }

    /// Vector from `other` to `self`.
    pub fn offset_from(&self, other: &Self) -> D::Coords {
        zip_coords::<D>(&self.coords, &other.coords, |a, b| a - b)
    }

    /// Ground-plane projection of the point.
    pub fn footprint(&self) -> (f64, f64) {
        D::footprint(&self.coords)
    }

    /// Height of the point, if the dimension has a vertical axis.
    pub fn height(&self) -> Option<f64> {
        D::height(&self.coords)
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords.as_ref().iter().all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Axis-aligned bounds
// ---------------------------------------------------------------------------

/// An axis-aligned bounding box; the bounds shape of every entity.
///
/// All predicates are closed: boxes that merely touch intersect, and a box
/// contains its own boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Aabb<D: Dimension> {
    /// Lower corner.
    pub min: Point<D>,
    /// Upper corner.
    pub max: Point<D>,
}

impl<D: Dimension> Aabb<D> {
    /// Create a box spanning two arbitrary corners (normalized so that
    /// `min <= max` on every axis).
    pub fn new(a: Point<D>, b: Point<D>) -> Self {
        Self {
            min: Point::new(zip_coords::<D>(&a.coords, &b.coords, f64::min)),
            max: Point::new(zip_coords::<D>(&a.coords, &b.coords, f64::max)),
        }
    }

    /// A degenerate box around a single point.
    pub const fn point(p: Point<D>) -> Self {
        Self { min: p, max: p }
    }

    /// A box centred on `center` with the given half extents.
    pub fn from_center(center: Point<D>, half_extents: &D::Coords) -> Self {
        let min = zip_coords::<D>(&center.coords, half_extents, |c, h| c - h.abs());
        let max = zip_coords::<D>(&center.coords, half_extents, |c, h| c + h.abs());
        Self {
            min: Point::new(min),
            max: Point::new(max),
        }
    }

    /// Centre of the box.
    pub fn center(&self) -> Point<D> {
        Point::new(zip_coords::<D>(&self.min.coords, &self.max.coords, |a, b| {
            (a + b) * 0.5
        }))
    }

    /// Half extents of the box along each axis.
    pub fn half_extents(&self) -> D::Coords {
        zip_coords::<D>(&self.min.coords, &self.max.coords, |a, b| (b - a) * 0.5)
    }

    /// Extent of the box along `axis`.
    pub fn extent(&self, axis: usize) -> f64 {
        self.max.axis(axis) - self.min.axis(axis)
    }

    /// Index of the axis with the greatest extent (first one on ties).
    pub fn widest_axis(&self) -> usize {
        let mut best = 0;
        let mut best_extent = f64::NEG_INFINITY;
        for axis in 0..D::AXES {
            let extent = self.extent(axis);
            if extent > best_extent {
                best = axis;
                best_extent = extent;
            }
        }
        best
    }

    /// Whether the point lies in the closed box.
    pub fn contains_point(&self, p: &Point<D>) -> bool {
        self.min
            .coords
            .as_ref()
            .iter()
            .zip(self.max.coords.as_ref())
            .zip(p.coords.as_ref())
            .all(|((lo, hi), v)| lo <= v && v <= hi)
    }

    /// Whether `other` lies entirely inside this closed box.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Whether the two closed boxes share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min
            .coords
            .as_ref()
            .iter()
            .zip(self.max.coords.as_ref())
            .zip(other.min.coords.as_ref().iter().zip(other.max.coords.as_ref()))
            .all(|((lo, hi), (olo, ohi))| lo <= ohi && olo <= hi)
    }

    /// Whether the boxes intersect only along their boundary (no shared
    /// interior volume on at least one axis).
    pub fn touches(&self, other: &Self) -> bool {
        self.intersects(other)
            && self
                .min
                .coords
                .as_ref()
                .iter()
                .zip(self.max.coords.as_ref())
                .zip(other.min.coords.as_ref().iter().zip(other.max.coords.as_ref()))
                .any(|((lo, hi), (olo, ohi))| {
                    hi.total_cmp(olo).is_eq() || ohi.total_cmp(lo).is_eq()
                })
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point::new(zip_coords::<D>(&self.min.coords, &other.min.coords, f64::min)),
            max: Point::new(zip_coords::<D>(&self.max.coords, &other.max.coords, f64::max)),
        }
    }

    /// Squared distance from a point to the closest point of the box
    /// (zero when the point is inside).
    pub fn min_distance_squared(&self, p: &Point<D>) -> f64 {
        self.min
            .coords
            .as_ref()
            .iter()
            .zip(self.max.coords.as_ref())
            .zip(p.coords.as_ref())
            .map(|((lo, hi), v)| {
                let d = if v < lo {
                    lo - v
                } else if v > hi {
                    v - hi
                } else {
                    0.0
                };
                d * d
            })
            .sum()
    }

    /// Distance from a point to the closest point of the box.
    pub fn min_distance(&self, p: &Point<D>) -> f64 {
        self.min_distance_squared(p).sqrt()
    }

    /// Squared distance from a point to the farthest corner of the box.
    pub fn max_distance_squared(&self, p: &Point<D>) -> f64 {
        self.min
            .coords
            .as_ref()
            .iter()
            .zip(self.max.coords.as_ref())
            .zip(p.coords.as_ref())
            .map(|((lo, hi), v)| {
                let d = (v - lo).abs().max((hi - v).abs());
                d * d
            })
            .sum()
    }

    /// Translate the box by an offset vector.
    pub fn translated(&self, offset: &D::Coords) -> Self {
        Self {
            min: self.min.translated(offset),
            max: self.max.translated(offset),
        }
    }

    /// Re-centre the box on `center`, keeping its extents.
    pub fn recentered(&self, center: &Point<D>) -> Self {
        let offset = center.offset_from(&self.center());
        self.translated(&offset)
    }

    /// Split the box into a lower and an upper half at `value` along `axis`.
    ///
    /// `value` is clamped into the box so both halves stay well formed.
    pub fn split(&self, axis: usize, value: f64) -> (Self, Self) {
        let cut = value.clamp(self.min.axis(axis), self.max.axis(axis));
        let mut lower = *self;
        let mut upper = *self;
        if let Some(v) = lower.max.coords.as_mut().get_mut(axis) {
            *v = cut;
        }
        if let Some(v) = upper.min.coords.as_mut().get_mut(axis) {
            *v = cut;
        }
        (lower, upper)
    }

    /// Ground-plane projection of the box.
    pub fn footprint(&self) -> Aabb<Dim2> {
        let (x0, y0) = self.min.footprint();
        let (x1, y1) = self.max.footprint();
        Aabb::new(Point::new([x0, y0]), Point::new([x1, y1]))
    }

    /// Whether every coordinate of both corners is finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Classification, positions, planar vectors
// ---------------------------------------------------------------------------

/// Relation of an entity's bounds to a query region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Entirely inside the region (including bounds that only touch it).
    Inside,
    /// Entirely outside the region.
    Outside,
    /// Partly inside and partly outside.
    Spanning,
}

/// A location plus an orientation (yaw, radians) in a `D`-dimensional world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Position<D: Dimension> {
    /// The location.
    pub point: Point<D>,
    /// Orientation in the ground plane, in radians.
    pub orientation: f64,
}

impl<D: Dimension> Position<D> {
    /// Create a position.
    pub const fn new(point: Point<D>, orientation: f64) -> Self {
        Self { point, orientation }
    }
}

/// A vector in the ground plane (force fields, slopes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vector2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a vector.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Component-wise sum.
    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    /// Scalar multiple.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalized(&self) -> Self {
        let length = self.length();
        if length > 0.0 {
            self.scaled(1.0 / length)
        } else {
            Self::ZERO
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn box2(x0: f64, y0: f64, x1: f64, y1: f64) -> Aabb<Dim2> {
        Aabb::new(Point::new([x0, y0]), Point::new([x1, y1]))
    }

    #[test]
    fn new_normalizes_corners() {
        let b = box2(2.0, 0.0, 0.0, 2.0);
        assert_eq!(b.min.coords, [0.0, 0.0]);
        assert_eq!(b.max.coords, [2.0, 2.0]);
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = box2(0.0, 0.0, 1.0, 1.0);
        let b = box2(1.0, 0.0, 2.0, 1.0);
        assert!(a.intersects(&b));
        assert!(a.touches(&b));
        let c = box2(1.5, 0.0, 2.0, 1.0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn distances_to_box() {
        let b = box2(0.0, 0.0, 2.0, 2.0);
        let inside = Point::new([1.0, 1.0]);
        let outside = Point::new([5.0, 2.0]);
        assert_eq!(b.min_distance_squared(&inside), 0.0);
        assert_eq!(b.min_distance(&outside), 3.0);
        // Farthest corner from (5, 2) is (0, 0).
        assert_eq!(b.max_distance_squared(&outside), 29.0);
    }

    #[test]
    fn split_and_widest_axis() {
        let b = box2(0.0, 0.0, 4.0, 2.0);
        assert_eq!(b.widest_axis(), 0);
        let (lo, hi) = b.split(0, 1.0);
        assert_eq!(lo.max.coords, [1.0, 2.0]);
        assert_eq!(hi.min.coords, [1.0, 0.0]);
        // Clamped cut.
        let (lo, _) = b.split(1, 10.0);
        assert_eq!(lo.max.coords, [4.0, 2.0]);
    }

    #[test]
    fn three_d_projection_helpers() {
        let p: Point<Dim3> = Point::new([1.0, 2.0, 3.0]);
        assert_eq!(p.footprint(), (1.0, 2.0));
        assert_eq!(p.height(), Some(3.0));
        assert_eq!(Dim3::with_height(p.coords, 7.0), [1.0, 2.0, 7.0]);

        let b: Aabb<Dim3> = Aabb::new(p, Point::new([3.0, 4.0, 9.0]));
        assert_eq!(b.footprint(), box2(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn one_d_has_no_height() {
        let p: Point<Dim1> = Point::new([4.0]);
        assert_eq!(p.height(), None);
        assert_eq!(p.footprint(), (4.0, 0.0));
    }

    #[test]
    fn clamp_norm_limits_length() {
        let v = [3.0, 4.0];
        let clamped = clamp_norm::<Dim2>(&v, 2.5);
        assert!((norm::<Dim2>(&clamped) - 2.5).abs() < 1e-12);
        assert_eq!(clamp_norm::<Dim2>(&v, f64::INFINITY), v);
    }

    #[test]
    fn rotation_quarter_turn() {
        let r = Dim2::rotate_xy([1.0, 0.0], core::f64::consts::FRAC_PI_2);
        assert!((r[0]).abs() < 1e-12);
        assert!((r[1] - 1.0).abs() < 1e-12);
    }
}
