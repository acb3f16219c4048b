use glam::Vec3;

use super::Visibility;
use crate::bounds::Aabb;

/// Opaque sphere hiding everything behind the planet's horizon.
///
/// From a camera at distance `D` from the center, the sphere of radius `r`
/// subtends a cone of half-angle `alpha` with `cos(alpha) = sqrt(D^2 - r^2) / D`.
/// A point is hidden when it lies inside that cone and farther from the
/// camera than the tangent distance `sqrt(D^2 - r^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HorizonOccluder {
  pub center: Vec3,
  /// Must not exceed the lowest terrain point.
  pub radius: f32,
}

/// Cone parameters for one camera position.
struct Cone {
  /// Unit vector from camera to sphere center.
  axis: Vec3,
  cos_alpha: f32,
  tangent: f32,
}

impl HorizonOccluder {
  pub fn new(center: Vec3, radius: f32) -> Self {
    Self { center, radius }
  }

  fn cone(&self, camera: Vec3) -> Option<Cone> {
    let to_center = self.center - camera;
    let dist_sq = to_center.length_squared();
    let r_sq = self.radius * self.radius;
    // Inside the sphere: nothing to occlude.
    if dist_sq <= r_sq || self.radius <= 0.0 {
      return None;
    }
    let dist = dist_sq.sqrt();
    let tangent = (dist_sq - r_sq).sqrt();
    Some(Cone {
      axis: to_center / dist,
      cos_alpha: tangent / dist,
      tangent,
    })
  }

  fn occludes(cone: &Cone, camera: Vec3, p: Vec3) -> bool {
    let w = p - camera;
    let len = w.length();
    if len <= cone.tangent {
      return false;
    }
    w.dot(cone.axis) / len > cone.cos_alpha
  }

  /// True when `p` is hidden behind the sphere as seen from `camera`.
  pub fn is_point_occluded(&self, camera: Vec3, p: Vec3) -> bool {
    self
      .cone(camera)
      .is_some_and(|cone| Self::occludes(&cone, camera, p))
  }

  /// All 8 corners hidden: `Outside`; some: `Intersects`; none: `Inside`.
  pub fn classify_aabb(&self, camera: Vec3, aabb: &Aabb) -> Visibility {
    let Some(cone) = self.cone(camera) else {
      return Visibility::Inside;
    };
    let occluded = aabb
      .corners()
      .iter()
      .filter(|corner| Self::occludes(&cone, camera, **corner))
      .count();
    match occluded {
      8 => Visibility::Outside,
      0 => Visibility::Inside,
      _ => Visibility::Intersects,
    }
  }
}
