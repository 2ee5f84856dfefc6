//! Axis-aligned bounding boxes.

use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// An axis-aligned box, `min` and `max` inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Lowest corner.
    pub min: Point3<f32>,
    /// Highest corner.
    pub max: Point3<f32>,
}

impl Aabb {
    /// Creates a box from two corners.
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Aabb { min, max }
    }

    /// The box containing nothing. Adding a point to it yields that point.
    pub fn empty() -> Self {
        Aabb {
            min: Point3::from_slice(&[f32::INFINITY; 3]),
            max: Point3::from_slice(&[f32::NEG_INFINITY; 3]),
        }
    }

    /// `[-1, -1, -1]..[1, 1, 1]`.
    pub fn unit() -> Self {
        Aabb {
            min: Point3::new(-1.0, -1.0, -1.0),
            max: Point3::new(1.0, 1.0, 1.0),
        }
    }

    /// A degenerate box holding a single point.
    pub fn from_point(p: Point3<f32>) -> Self {
        Aabb { min: p, max: p }
    }

    /// `true` if the box contains no point.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grows the box to contain `p`.
    pub fn add_point(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grows the box to contain `other`.
    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.add_point(&other.min);
        self.add_point(&other.max);
    }

    /// Centre point. Meaningless for an empty box.
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// The box enclosing this one after transforming it by `m`.
    pub fn transformed(&self, m: &Matrix4<f32>) -> Aabb {
        let mut out = Aabb::empty();
        if self.is_empty() {
            return out;
        }
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.add_point(&m.transform_point(&corner));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::empty()
    }
}
