// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Axis-aligned bounding volumes.

use super::{Mat4, Vec3};

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// The corner with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that acts as the identity for [`Aabb::merge`].
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from two corners given in any order.
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Computes the tightest box around `points`, or `None` if the slice is empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(
            points
                .iter()
                .fold(Self::INVALID, |aabb, &p| aabb.merged_with_point(p)),
        )
    }

    /// The center point of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The full extent of the box along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns `true` if `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Returns the smallest box containing both `self` and `other`.
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns the smallest box containing both `self` and `point`.
    pub fn merged_with_point(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Transforms the eight corners and returns the box enclosing them.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        corners.iter().fold(Self::INVALID, |aabb, &corner| {
            aabb.merged_with_point(matrix.transform_point3(corner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_points_encloses_all() {
        let aabb = Aabb::from_points(&[
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::ZERO,
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn invalid_is_merge_identity() {
        let unit = Aabb::from_min_max(Vec3::ONE, Vec3::ZERO);
        assert!(!Aabb::INVALID.is_valid());
        assert_eq!(Aabb::INVALID.merge(&unit), unit);
    }

    #[test]
    fn transform_translates_and_scales() {
        let unit = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let matrix = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let moved = unit.transform(&matrix);
        assert_relative_eq!(moved.min, Vec3::new(0.0, 5.0, 0.0));
        assert_relative_eq!(moved.max, Vec3::new(2.0, 7.0, 2.0));
        assert_relative_eq!(moved.center(), Vec3::new(1.0, 6.0, 1.0));
    }
}
