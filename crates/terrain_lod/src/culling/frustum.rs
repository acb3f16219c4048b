use glam::{Mat4, Vec3, Vec4};

use super::Visibility;
use crate::bounds::Aabb;

/// Six normalized planes `(n, d)` with `n . p + d >= 0` inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
  pub planes: [Vec4; 6],
}

impl Frustum {
  /// Extract planes from a projection-view matrix (Gribb/Hartmann).
  ///
  /// Assumes glam's `[0, 1]` clip depth, so the near plane is row 2 alone.
  pub fn from_view_projection(m: Mat4) -> Self {
    let r0 = m.row(0);
    let r1 = m.row(1);
    let r2 = m.row(2);
    let r3 = m.row(3);
    let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(normalize_plane);
    Self { planes }
  }

  /// Signed distance of a point to plane `i`.
  #[inline]
  pub fn distance(&self, i: usize, p: Vec3) -> f32 {
    self.planes[i].truncate().dot(p) + self.planes[i].w
  }

  pub fn contains_point(&self, p: Vec3) -> bool {
    (0..6).all(|i| self.distance(i, p) >= 0.0)
  }

  /// P-vertex / N-vertex classification.
  pub fn classify_aabb(&self, aabb: &Aabb) -> Visibility {
    let mut result = Visibility::Inside;
    for plane in &self.planes {
      let n = plane.truncate();
      let positive = Vec3::select(n.cmpge(Vec3::ZERO), aabb.max, aabb.min);
      if n.dot(positive) + plane.w < 0.0 {
        return Visibility::Outside;
      }
      let negative = Vec3::select(n.cmpge(Vec3::ZERO), aabb.min, aabb.max);
      if n.dot(negative) + plane.w < 0.0 {
        result = Visibility::Intersects;
      }
    }
    result
  }
}

#[inline]
fn normalize_plane(plane: Vec4) -> Vec4 {
  let len = plane.truncate().length();
  if len > 0.0 {
    plane / len
  } else {
    plane
  }
}
