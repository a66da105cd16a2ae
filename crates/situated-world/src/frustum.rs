//! Query regions and agent viewing frustums.
//!
//! Every tree query takes a [`Region`]. The trait exposes three exact
//! geometric predicates and derives the INSIDE / OUTSIDE / SPANNING
//! classification from them; bounds that merely touch the region boundary
//! classify as INSIDE.

use serde::{Deserialize, Serialize};
use situated_types::{Aabb, Classification, Dimension, Point, geometry::map_coords};

/// A bounded region of space that can classify entity bounds.
pub trait Region<D: Dimension>: Send + Sync {
    /// Smallest axis-aligned box enclosing the region.
    fn bounds(&self) -> Aabb<D>;

    /// Whether `target` lies entirely inside the closed region.
    fn encloses(&self, target: &Aabb<D>) -> bool;

    /// Whether `target` shares at least one point with the closed region.
    fn intersects(&self, target: &Aabb<D>) -> bool;

    /// Whether `target` meets the region only on its boundary.
    fn touches(&self, target: &Aabb<D>) -> bool;

    /// Classify `target` against the region.
    fn classify(&self, target: &Aabb<D>) -> Classification {
        if !self.intersects(target) {
            Classification::Outside
        } else if self.encloses(target) || self.touches(target) {
            Classification::Inside
        } else {
            Classification::Spanning
        }
    }
}

impl<D: Dimension> Region<D> for Aabb<D> {
    fn bounds(&self) -> Aabb<D> {
        *self
    }

    fn encloses(&self, target: &Aabb<D>) -> bool {
        self.contains(target)
    }

    fn intersects(&self, target: &Aabb<D>) -> bool {
        Self::intersects(self, target)
    }

    fn touches(&self, target: &Aabb<D>) -> bool {
        Self::touches(self, target)
    }
}

/// The region within which an agent senses entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "snake_case")]
pub enum Frustum<D: Dimension> {
    /// Everything within `radius` of `eye`.
    Sphere {
        /// Centre of the sphere.
        eye: Point<D>,
        /// Sensing radius.
        radius: f64,
    },
    /// An axis-aligned sensing box; its centre acts as the eye.
    Box {
        /// The sensed region.
        region: Aabb<D>,
    },
}

impl<D: Dimension> Frustum<D> {
    /// A spherical frustum.
    pub const fn sphere(eye: Point<D>, radius: f64) -> Self {
        Self::Sphere { eye, radius }
    }

    /// A box frustum.
    pub const fn boxed(region: Aabb<D>) -> Self {
        Self::Box { region }
    }

    /// Point from which percept distances are measured.
    pub fn eye(&self) -> Point<D> {
        match self {
            Self::Sphere { eye, .. } => *eye,
            Self::Box { region } => region.center(),
        }
    }
}

impl<D: Dimension> Region<D> for Frustum<D> {
    fn bounds(&self) -> Aabb<D> {
        match self {
            Self::Sphere { eye, radius } => {
                Aabb::from_center(*eye, &map_coords::<D>(&eye.coords, |_| *radius))
            }
            Self::Box { region } => *region,
        }
    }

    fn encloses(&self, target: &Aabb<D>) -> bool {
        match self {
            Self::Sphere { eye, radius } => target.max_distance_squared(eye) <= radius * radius,
            Self::Box { region } => region.contains(target),
        }
    }

    fn intersects(&self, target: &Aabb<D>) -> bool {
        match self {
            Self::Sphere { eye, radius } => target.min_distance_squared(eye) <= radius * radius,
            Self::Box { region } => region.intersects(target),
        }
    }

    fn touches(&self, target: &Aabb<D>) -> bool {
        match self {
            Self::Sphere { eye, radius } => target
                .min_distance_squared(eye)
                .total_cmp(&(radius * radius))
                .is_eq(),
            Self::Box { region } => region.touches(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use situated_types::Dim2;

    fn box2(x0: f64, y0: f64, x1: f64, y1: f64) -> Aabb<Dim2> {
        Aabb::new(Point::new([x0, y0]), Point::new([x1, y1]))
    }

    #[test]
    fn box_classification() {
        let region = box2(0.0, 0.0, 10.0, 10.0);
        assert_eq!(region.classify(&box2(1.0, 1.0, 2.0, 2.0)), Classification::Inside);
        assert_eq!(region.classify(&box2(9.0, 9.0, 11.0, 11.0)), Classification::Spanning);
        assert_eq!(region.classify(&box2(11.0, 0.0, 12.0, 1.0)), Classification::Outside);
    }

    #[test]
    fn touching_the_boundary_is_inside() {
        let region = box2(0.0, 0.0, 10.0, 10.0);
        assert_eq!(region.classify(&box2(10.0, 2.0, 12.0, 3.0)), Classification::Inside);

        let sphere = Frustum::sphere(Point::new([0.0, 0.0]), 5.0);
        assert_eq!(sphere.classify(&box2(5.0, -1.0, 6.0, 1.0)), Classification::Inside);
    }

    #[test]
    fn sphere_classification() {
        let sphere = Frustum::sphere(Point::new([0.0, 0.0]), 5.0);
        assert_eq!(sphere.classify(&box2(1.0, 1.0, 2.0, 2.0)), Classification::Inside);
        assert_eq!(sphere.classify(&box2(3.0, 3.0, 4.0, 4.0)), Classification::Spanning);
        // Corner (4, 4) is at distance sqrt(32) > 5.
        assert_eq!(sphere.classify(&box2(4.0, 4.0, 6.0, 6.0)), Classification::Outside);
        assert_eq!(sphere.bounds(), box2(-5.0, -5.0, 5.0, 5.0));
    }

    #[test]
    fn box_frustum_eye_is_centre() {
        let frustum = Frustum::boxed(box2(0.0, 0.0, 4.0, 2.0));
        assert_eq!(frustum.eye(), Point::new([2.0, 1.0]));
    }
}
