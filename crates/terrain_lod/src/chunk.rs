//! Generated geometry payloads.

use bytemuck::{Pod, Zeroable};

use crate::bounds::Aabb;

/// Interleaved vertex ready for GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ChunkVertex {
  /// World-space position.
  pub position: [f32; 3],

  /// Surface normal (unit vector).
  pub normal: [f32; 3],

  /// Material blend weights (sum to 1.0): rock, grass, sand, snow.
  pub material_weights: [f32; 4],
}

impl Default for ChunkVertex {
  fn default() -> Self {
    Self {
      position: [0.0; 3],
      normal: [0.0, 1.0, 0.0],
      material_weights: [1.0, 0.0, 0.0, 0.0],
    }
  }
}

/// Worker output for one node.
#[derive(Clone, Debug)]
pub struct ChunkMesh {
  pub vertices: Vec<ChunkVertex>,
  /// Triangle indices (3 per triangle).
  pub indices: Vec<u32>,
  /// Bounds of the vertices, or the extraction bounds when empty.
  pub bounds: Aabb,
  /// Set when extraction produced zero triangles.
  pub is_empty: bool,
}

impl ChunkMesh {
  /// Placeholder for a region the surface does not cross.
  pub fn empty(bounds: Aabb) -> Self {
    Self {
      vertices: Vec::new(),
      indices: Vec::new(),
      bounds,
      is_empty: true,
    }
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Vertex bytes for upload.
  pub fn vertex_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.vertices)
  }

  /// Index bytes for upload.
  pub fn index_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.indices)
  }
}

/// Stable identifier the renderer keys GPU buffers by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkHandle(pub u64);

/// Geometry resident on a node.
#[derive(Debug)]
pub struct Chunk {
  pub handle: ChunkHandle,
  pub mesh: ChunkMesh,
}
