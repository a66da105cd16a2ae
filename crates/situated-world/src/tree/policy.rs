//! Partition policies: how an overfull leaf region is cut.

use serde::{Deserialize, Serialize};
use situated_types::{Aabb, Dimension, Point};

/// Strategy cutting a leaf region into child regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionPolicy {
    /// Halve the region at its centre along its widest axis.
    #[default]
    #[serde(rename = "center")]
    CenterSplit,
    /// Cut the region along its widest axis at the median entity centre.
    #[serde(rename = "median")]
    MedianSplit,
    /// Halve the region along every axis (quadtree in 2D, octree in 3D).
    #[serde(rename = "orthant")]
    OrthantSplit,
}

impl PartitionPolicy {
    /// Child regions for `region`, given the centres of the entities it
    /// currently holds. The children tile the region.
    pub fn child_regions<D: Dimension>(self, region: &Aabb<D>, centres: &[Point<D>]) -> Vec<Aabb<D>> {
        let axis = region.widest_axis();
        match self {
            Self::CenterSplit => {
                let (lower, upper) = region.split(axis, region.center().axis(axis));
                vec![lower, upper]
            }
            Self::MedianSplit => {
                let mut values: Vec<f64> = centres.iter().map(|c| c.axis(axis)).collect();
                values.sort_by(f64::total_cmp);
                let cut = values
                    .get(values.len() / 2)
                    .copied()
                    .unwrap_or_else(|| region.center().axis(axis));
                let (lower, upper) = region.split(axis, cut);
                vec![lower, upper]
            }
            Self::OrthantSplit => {
                let centre = region.center();
                (0..D::AXES).fold(vec![*region], |cells, axis| {
                    cells
                        .iter()
                        .flat_map(|cell| {
                            let (lower, upper) = cell.split(axis, centre.axis(axis));
                            [lower, upper]
                        })
                        .collect()
                })
            }
        }
    }
}

/// Index of the region an entity centred at `centre` belongs to: the first
/// region containing the centre, otherwise the closest one.
pub(super) fn pick_region<'a, D: Dimension>(
    regions: impl IntoIterator<Item = &'a Aabb<D>>,
    centre: &Point<D>,
) -> Option<usize> {
    let mut closest: Option<(usize, f64)> = None;
    for (index, region) in regions.into_iter().enumerate() {
        let distance = region.min_distance_squared(centre);
        if distance <= 0.0 && region.contains_point(centre) {
            return Some(index);
        }
        if closest.is_none_or(|(_, best)| distance < best) {
            closest = Some((index, distance));
        }
    }
    closest.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use situated_types::{Dim2, Dim3};

    fn region() -> Aabb<Dim2> {
        Aabb::new(Point::new([0.0, 0.0]), Point::new([8.0, 4.0]))
    }

    #[test]
    fn center_split_halves_widest_axis() {
        let children = PartitionPolicy::CenterSplit.child_regions(&region(), &[]);
        assert_eq!(children.len(), 2);
        assert_eq!(children.first().map(|c| c.max.coords), Some([4.0, 4.0]));
    }

    #[test]
    fn median_split_cuts_at_median_centre() {
        let centres = [
            Point::new([1.0, 1.0]),
            Point::new([2.0, 1.0]),
            Point::new([7.0, 1.0]),
        ];
        let children = PartitionPolicy::MedianSplit.child_regions(&region(), &centres);
        assert_eq!(children.first().map(|c| c.max.coords), Some([2.0, 4.0]));
    }

    #[test]
    fn orthant_split_produces_two_to_the_axes() {
        let cube: Aabb<Dim3> = Aabb::new(Point::new([0.0; 3]), Point::new([2.0; 3]));
        let children = PartitionPolicy::OrthantSplit.child_regions(&cube, &[]);
        assert_eq!(children.len(), 8);
        let volume: f64 = children
            .iter()
            .map(|c| c.extent(0) * c.extent(1) * c.extent(2))
            .sum();
        assert!((volume - 8.0).abs() < 1e-12);
    }

    #[test]
    fn pick_region_falls_back_to_closest() {
        let children = PartitionPolicy::CenterSplit.child_regions(&region(), &[]);
        assert_eq!(pick_region(&children, &Point::new([5.0, 1.0])), Some(1));
        assert_eq!(pick_region(&children, &Point::new([-3.0, 1.0])), Some(0));
        // On the cut, the first containing region wins.
        assert_eq!(pick_region(&children, &Point::new([4.0, 1.0])), Some(0));
    }
}
