//! Visibility classification of node boxes.
//!
//! Two independent tests, combined by taking the stricter answer:
//!
//! - [`Frustum`]: six clip planes extracted from the view-projection matrix.
//! - [`HorizonOccluder`]: the planet as an opaque sphere; boxes hidden
//!   behind its limb are culled even when they sit inside the frustum.

mod frustum;
mod horizon;

pub use frustum::Frustum;
pub use horizon::HorizonOccluder;

use glam::{Mat4, Vec3};

use crate::bounds::Aabb;

/// Classification of a box against a view volume.
///
/// Ordered from strictest to most permissive so `min` combines two tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
  Outside,
  Intersects,
  Inside,
}

impl Visibility {
  #[inline]
  pub fn is_visible(self) -> bool {
    self != Visibility::Outside
  }
}

/// Frustum plus optional horizon occlusion for one camera.
#[derive(Clone, Copy, Debug)]
pub struct Culler {
  pub frustum: Frustum,
  pub horizon: Option<HorizonOccluder>,
  pub camera: Vec3,
}

impl Culler {
  pub fn new(view_projection: Mat4, camera: Vec3, horizon: Option<HorizonOccluder>) -> Self {
    Self {
      frustum: Frustum::from_view_projection(view_projection),
      horizon,
      camera,
    }
  }

  /// Frustum-only classification.
  #[inline]
  pub fn classify_frustum(&self, aabb: &Aabb) -> Visibility {
    self.frustum.classify_aabb(aabb)
  }

  /// Stricter of the frustum and horizon classifications.
  pub fn classify(&self, aabb: &Aabb) -> Visibility {
    let frustum = self.frustum.classify_aabb(aabb);
    if frustum == Visibility::Outside {
      return frustum;
    }
    match &self.horizon {
      Some(horizon) => frustum.min(horizon.classify_aabb(self.camera, aabb)),
      None => frustum,
    }
  }
}
