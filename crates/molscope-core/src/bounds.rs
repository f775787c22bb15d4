//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Expansion applied to a box that collapsed to a single point.
pub const DEGENERATE_EXPANSION: f32 = 5.0;

/// An axis-aligned box. The empty box has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    /// The empty box, neutral element of [`BoundingBox::union`].
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Creates a box from its corners.
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut bb, p| {
            bb.expand_by_point(p);
            bb
        })
    }

    /// Returns true if the box contains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Returns true if the box is a single point.
    #[must_use]
    pub fn is_point(&self) -> bool {
        !self.is_empty() && self.min == self.max
    }

    /// Grows the box to contain `p`.
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grows the box by `s` on every side.
    pub fn expand_by_scalar(&mut self, s: f32) {
        if self.is_empty() {
            return;
        }
        self.min -= Vec3::splat(s);
        self.max += Vec3::splat(s);
    }

    /// Grows the box to contain `other`.
    pub fn union_with(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Returns the union of both boxes.
    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        self.union_with(other);
        self
    }

    /// Returns true if `other` lies inside this box.
    #[must_use]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.is_empty()
            || (self.min.cmple(other.min).all() && self.max.cmpge(other.max).all())
    }

    /// The eight corners.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box around the eight transformed corners.
    #[must_use]
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(self.corners().iter().map(|c| m.transform_point3(*c)))
    }

    /// Extent along each axis; zero for the empty box.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Center point; zero for the empty box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Length of the diagonal.
    #[must_use]
    pub fn diagonal_length(&self) -> f32 {
        self.size().length()
    }

    /// Expands a point-sized box by [`DEGENERATE_EXPANSION`].
    #[must_use]
    pub fn non_degenerate(mut self) -> Self {
        if self.is_point() {
            self.expand_by_scalar(DEGENERATE_EXPANSION);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty() {
        let bb = BoundingBox::default();
        assert!(bb.is_empty());
        assert_eq!(bb.size(), Vec3::ZERO);
        assert_eq!(bb.diagonal_length(), 0.0);
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(bb.union(&BoundingBox::EMPTY), bb);
        assert_eq!(BoundingBox::EMPTY.union(&bb), bb);
    }

    #[test]
    fn test_point_expansion() {
        let bb = BoundingBox::from_points([Vec3::new(1.0, 2.0, 3.0)]).non_degenerate();
        assert_eq!(bb.min, Vec3::new(-4.0, -3.0, -2.0));
        assert_eq!(bb.max, Vec3::new(6.0, 7.0, 8.0));
    }

    #[test]
    fn test_transformed_translation() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let t = bb.transformed(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(t.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(t.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn test_transformed_rotation_grows() {
        let bb = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let r = bb.transformed(&Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4));
        assert!(r.contains_box(&bb));
        assert!((r.max.x - 2.0_f32.sqrt()).abs() < 1e-5);
    }

    fn arb_box() -> impl Strategy<Value = BoundingBox> {
        (
            prop::array::uniform3(-1000.0f32..1000.0),
            prop::array::uniform3(0.0f32..100.0),
        )
            .prop_map(|(min, ext)| {
                let min = Vec3::from_array(min);
                BoundingBox::new(min, min + Vec3::from_array(ext))
            })
    }

    proptest! {
        #[test]
        fn union_never_shrinks(a in arb_box(), b in arb_box()) {
            let u = a.union(&b);
            prop_assert!(u.contains_box(&a));
            prop_assert!(u.contains_box(&b));
            prop_assert!(u.diagonal_length() >= a.diagonal_length());
        }
    }
}
