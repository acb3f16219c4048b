//! Applying worker results to the tree.
//!
//! A result is only accepted when its node is still alive and still waiting
//! for exactly that ticket. Anything else (node collapsed, request replaced
//! or expired) is counted as stale and dropped.

use super::{ChunkManager, Frame};
use crate::error::TaskError;
use crate::octree::{CullState, NodeState};

impl ChunkManager {
  pub(super) fn apply_completions(&mut self, frame: &mut Frame) {
    for result in self.scheduler.poll_completions() {
      self.metrics.record_generation(result.elapsed_us);

      let current = self
        .octree
        .get(result.node)
        .is_some_and(|node| node.pending == Some(result.ticket));
      if !current {
        tracing::trace!(node = ?result.node, ticket = result.ticket, "stale completion");
        frame.report.stale += 1;
        continue;
      }
      if let Some(node) = self.octree.get_mut(result.node) {
        node.pending = None;
      }

      match result.outcome {
        Ok(mesh) if !mesh.is_empty => {
          self.octree.attach_chunk(result.node, mesh);
          if let Some(node) = self.octree.get_mut(result.node) {
            node.cull_state = CullState::GeometryTested;
          }
          self.octree.update_geometry_status(result.node, true, self.epoch);
          frame.report.completed += 1;
        }
        Ok(_) => {
          self.octree.release_chunk(result.node);
          if let Some(node) = self.octree.get_mut(result.node) {
            node.state = NodeState::Ready;
            node.cull_state = CullState::GeometryTested;
          }
          self.octree.update_geometry_status(result.node, false, self.epoch);
          frame.report.completed += 1;
        }
        Err(err) => {
          let err = TaskError::from(err);
          self.octree.release_chunk(result.node);
          if let Some(node) = self.octree.get_mut(result.node) {
            tracing::warn!(key = ?node.key, %err, "chunk generation failed, will retry");
            // Tested-empty locally only; the parent keeps its geometry.
            node.state = NodeState::Empty;
            node.geometry_tested = true;
            node.has_geometry = false;
            node.retry = true;
          }
          frame.report.failed += 1;
        }
      }
    }
  }
}
