//! NodeKey - integer address of an octree cell.
//!
//! Keys are grid coordinates at the key's own level. Level 0 is the root
//! (a single cell), level `L` has `2^L` cells per axis.

use glam::Vec3;

use crate::bounds::Aabb;
use crate::config::TerrainConfig;

/// Grid address of a node, independent of arena storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeKey {
  /// Grid X position at this key's level
  pub x: u32,
  /// Grid Y position at this key's level
  pub y: u32,
  /// Grid Z position at this key's level
  pub z: u32,
  /// Depth below the root (0 = root, higher = finer)
  pub level: u32,
}

impl NodeKey {
  pub const ROOT: Self = Self {
    x: 0,
    y: 0,
    z: 0,
    level: 0,
  };

  pub fn new(x: u32, y: u32, z: u32, level: u32) -> Self {
    Self { x, y, z, level }
  }

  /// Child key one level finer.
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  pub fn child(&self, octant: u8) -> Self {
    debug_assert!(octant < 8, "octant out of range: {}", octant);
    Self {
      x: self.x * 2 + (octant & 1) as u32,
      y: self.y * 2 + ((octant >> 1) & 1) as u32,
      z: self.z * 2 + ((octant >> 2) & 1) as u32,
      level: self.level + 1,
    }
  }

  /// Parent key, or `None` for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.level == 0 {
      return None;
    }
    Some(Self {
      x: self.x / 2,
      y: self.y / 2,
      z: self.z / 2,
      level: self.level - 1,
    })
  }

  /// Which octant of its parent this key occupies.
  pub fn octant(&self) -> u8 {
    ((self.x & 1) | ((self.y & 1) << 1) | ((self.z & 1) << 2)) as u8
  }

  /// Minimum corner in world space.
  pub fn min_corner(&self, config: &TerrainConfig) -> Vec3 {
    let size = config.node_size(self.level);
    let root_min = config.planet_center_vec() - Vec3::splat(config.root_size() * 0.5);
    root_min + Vec3::new(self.x as f32, self.y as f32, self.z as f32) * size
  }

  /// Center in world space.
  pub fn center(&self, config: &TerrainConfig) -> Vec3 {
    self.min_corner(config) + Vec3::splat(config.node_size(self.level) * 0.5)
  }

  /// Cube covered by this key.
  pub fn bounds(&self, config: &TerrainConfig) -> Aabb {
    let min = self.min_corner(config);
    Aabb::new(min, min + Vec3::splat(config.node_size(self.level)))
  }
}
