//! Axis-aligned bounding box, used to size the implicit background domain and for quick
//! point-outside-root rejection before walking the universe tree.

use crate::numeric_types::Real;
use rayon::prelude::*;

/// An axis-aligned bounding box in 3D, stored as `[min, max]` per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisAlignedBoundingBox3d {
    min: [Real; 3],
    max: [Real; 3],
}

impl AxisAlignedBoundingBox3d {
    pub fn new(min: [Real; 3], max: [Real; 3]) -> Self {
        Self { min, max }
    }

    pub fn infinite() -> Self {
        Self {
            min: [Real::NEG_INFINITY; 3],
            max: [Real::INFINITY; 3],
        }
    }

    pub fn min(&self) -> [Real; 3] {
        self.min
    }

    pub fn max(&self) -> [Real; 3] {
        self.max
    }

    /// Smallest enclosing box of a point cloud, sequential.
    pub fn from_points(points: &[[Real; 3]]) -> Self {
        points
            .iter()
            .fold(Self::empty(), |acc, p| acc.extended_by_point(*p))
    }

    /// Smallest enclosing box of a point cloud, computed with a parallel reduction.
    pub fn from_points_par(points: &[[Real; 3]]) -> Self {
        points
            .par_iter()
            .fold(Self::empty, |acc, p| acc.extended_by_point(*p))
            .reduce(Self::empty, |a, b| a.union(&b))
    }

    fn empty() -> Self {
        Self {
            min: [Real::INFINITY; 3],
            max: [Real::NEG_INFINITY; 3],
        }
    }

    fn extended_by_point(mut self, p: [Real; 3]) -> Self {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
        self
    }

    fn union(&self, other: &Self) -> Self {
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for axis in 0..3 {
            min[axis] = self.min[axis].min(other.min[axis]);
            max[axis] = self.max[axis].max(other.max[axis]);
        }
        Self { min, max }
    }

    /// Grows the box uniformly in every direction by `margin`.
    pub fn grow_uniformly(&mut self, margin: Real) {
        for axis in 0..3 {
            self.min[axis] -= margin;
            self.max[axis] += margin;
        }
    }

    pub fn contains(&self, p: [Real; 3]) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_and_parallel_agree() {
        let points: Vec<[Real; 3]> = (0..1000)
            .map(|i| [i as Real, (i * 2) as Real, -(i as Real)])
            .collect();
        let seq = AxisAlignedBoundingBox3d::from_points(&points);
        let par = AxisAlignedBoundingBox3d::from_points_par(&points);
        assert_eq!(seq, par);
    }

    #[test]
    fn grow_uniformly_expands_both_sides() {
        let mut aabb = AxisAlignedBoundingBox3d::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        aabb.grow_uniformly(0.5);
        assert_eq!(aabb.min(), [-0.5, -0.5, -0.5]);
        assert_eq!(aabb.max(), [1.5, 1.5, 1.5]);
    }
}
