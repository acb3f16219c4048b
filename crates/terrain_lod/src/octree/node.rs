//! OctreeNode - one cell of the LOD tree as stored in the arena.

use glam::Vec3;

use super::arena::NodeId;
use super::key::NodeKey;
use crate::bounds::Aabb;
use crate::chunk::Chunk;
use crate::config::TerrainConfig;
use crate::culling::Visibility;

/// Lifecycle state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
  /// No result and nothing pending.
  Empty,
  /// A generation request is queued or running.
  Generating,
  /// Generation finished. A chunk is present only if the node has geometry.
  Ready,
  /// Children cover this node; its own chunk was released under memory
  /// pressure.
  Subdivided,
  /// Not visible and never generated.
  Culled,
}

/// Result of the density cull test, or the fact that a worker has already
/// answered the geometry question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullState {
  Unknown,
  /// Entirely solid.
  Inside,
  /// Entirely air.
  Outside,
  /// The surface may cross the node.
  Intersects,
  /// Classified by a completed generation.
  GeometryTested,
}

impl CullState {
  /// True when the cull test proved the node homogeneous.
  #[inline]
  pub fn is_homogeneous(self) -> bool {
    matches!(self, CullState::Inside | CullState::Outside)
  }
}

#[derive(Debug)]
pub struct OctreeNode {
  pub key: NodeKey,
  pub center: Vec3,
  /// Edge length.
  pub size: f32,
  /// Node cube plus one voxel on the positive side.
  pub extraction_bounds: Aabb,
  pub level: u32,
  pub state: NodeState,
  pub cull_state: CullState,
  /// Sticky until a forced retest or a new world epoch.
  pub geometry_tested: bool,
  pub has_geometry: bool,
  pub chunk: Option<Chunk>,
  /// Either absent or all 8 octants.
  pub children: Option<[NodeId; 8]>,
  pub parent: Option<NodeId>,
  pub distance_to_camera: f32,
  pub is_visible: bool,
  /// Ticket of the outstanding generation request.
  pub pending: Option<u64>,
  /// World epoch in which `geometry_tested` was last set.
  pub tested_epoch: u64,
  /// Last generation failed; resubmit on the next traversal.
  pub retry: bool,
  /// Set by [`Octree::force_retest`](super::Octree::force_retest).
  pub retest_requested: bool,
  /// Visibility memoized for one frame id.
  pub visibility: Option<(u64, Visibility)>,
}

impl OctreeNode {
  pub(crate) fn new(key: NodeKey, parent: Option<NodeId>, config: &TerrainConfig) -> Self {
    let size = config.node_size(key.level);
    let min = key.min_corner(config);
    let voxel = config.voxel_size(key.level);
    Self {
      key,
      center: min + Vec3::splat(size * 0.5),
      size,
      extraction_bounds: Aabb::new(min, min + Vec3::splat(size + voxel)),
      level: key.level,
      state: NodeState::Empty,
      cull_state: CullState::Unknown,
      geometry_tested: false,
      has_geometry: false,
      chunk: None,
      children: None,
      parent,
      distance_to_camera: f32::INFINITY,
      is_visible: false,
      pending: None,
      tested_epoch: 0,
      retry: false,
      retest_requested: false,
      visibility: None,
    }
  }

  /// The node cube.
  #[inline]
  pub fn bounds(&self) -> Aabb {
    Aabb::from_center_size(self.center, self.size)
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// Has a usable generation result and nothing outstanding.
  #[inline]
  pub fn is_settled(&self) -> bool {
    self.geometry_tested && self.pending.is_none() && !self.retry
  }

  /// Tested empty and due for another look.
  #[inline]
  pub fn needs_retest(&self, epoch: u64) -> bool {
    self.geometry_tested
      && !self.has_geometry
      && self.pending.is_none()
      && (self.retest_requested || self.retry || self.tested_epoch != epoch)
  }

  /// Has geometry but the chunk was released.
  #[inline]
  pub fn needs_reload(&self) -> bool {
    self.is_leaf() && self.has_geometry && self.chunk.is_none() && self.pending.is_none()
  }

  /// Memoized visibility for `frame_id`.
  #[inline]
  pub fn visibility_for(&self, frame_id: u64) -> Option<Visibility> {
    match self.visibility {
      Some((frame, vis)) if frame == frame_id => Some(vis),
      _ => None,
    }
  }
}
