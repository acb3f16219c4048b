//! Render list extraction.

use smallvec::{smallvec, SmallVec};

use super::ChunkManager;
use crate::chunk::{ChunkHandle, ChunkMesh};
use crate::octree::{NodeId, NodeKey};

/// One chunk the renderer should draw this frame.
#[derive(Clone, Copy, Debug)]
pub struct RenderItem<'a> {
  pub node: NodeId,
  pub key: NodeKey,
  pub level: u32,
  pub handle: ChunkHandle,
  pub mesh: &'a ChunkMesh,
  pub distance: f32,
}

impl ChunkManager {
  /// Chunks to draw, coarsest level first (nearer first within a level).
  ///
  /// Uses the visibility computed by the last [`update`](Self::update): a
  /// subtree that was outside the view contributes nothing.
  pub fn renderables(&self) -> Vec<RenderItem<'_>> {
    let mut items = Vec::new();
    let mut stack: SmallVec<[NodeId; 64]> = smallvec![self.octree.root()];
    while let Some(id) = stack.pop() {
      let Some(node) = self.octree.get(id) else {
        continue;
      };
      if !node.is_visible {
        continue;
      }
      if self.octree.should_render(id) {
        if let Some(chunk) = &node.chunk {
          items.push(RenderItem {
            node: id,
            key: node.key,
            level: node.level,
            handle: chunk.handle,
            mesh: &chunk.mesh,
            distance: node.distance_to_camera,
          });
        }
      }
      if let Some(children) = node.children {
        stack.extend(children);
      }
    }
    items.sort_by(|a, b| {
      a.level
        .cmp(&b.level)
        .then(a.distance.total_cmp(&b.distance))
    });
    items
  }
}
