//! Camera snapshot passed to [`ChunkManager::update`](super::ChunkManager::update).

use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
  pub position: Vec3,
  /// Projection * view, right-handed, clip depth 0..1.
  pub view_projection: Mat4,
}

impl CameraState {
  pub fn new(position: Vec3, view_projection: Mat4) -> Self {
    Self {
      position,
      view_projection,
    }
  }

  /// Perspective camera at `eye` looking at `target`.
  ///
  /// Uses +Y as up unless the view direction is (nearly) vertical, then +Z.
  pub fn looking_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
    let forward = (target - eye).normalize_or_zero();
    let up = if forward.dot(Vec3::Y).abs() > 0.99 {
      Vec3::Z
    } else {
      Vec3::Y
    };
    let view = Mat4::look_at_rh(eye, target, up);
    let projection = Mat4::perspective_rh(fov_y, aspect, near, far);
    Self::new(eye, projection * view)
  }
}
