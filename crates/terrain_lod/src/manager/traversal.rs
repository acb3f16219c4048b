//! Camera-driven traversal: visibility, generation requests, subdivision
//! and collapse, plus the resident-chunk budget.
//!
//! The walk uses an explicit stack from the root. Subtrees outside the view
//! are pruned; newly created children are requested right away but only
//! visited on the next frame.

use smallvec::{smallvec, SmallVec};

use super::{idle_state, ChunkManager, Frame, RequestKind};
use crate::octree::{CullState, NodeId, NodeState};

impl ChunkManager {
  pub(super) fn traverse(&mut self, frame: &mut Frame) {
    let budget = self.config.budget;
    let mut subdivisions = 0;
    let mut collapses = 0;
    let mut stack: SmallVec<[NodeId; 64]> = smallvec![self.octree.root()];

    while let Some(id) = stack.pop() {
      let visibility = self.observe(id, frame);
      let Some(node) = self.octree.get(id) else {
        continue;
      };
      let collapse_distance = self.lod.get(node.level).collapse;

      if self.octree.should_collapse(id, collapse_distance)
        && budget.can_collapse(collapses)
        && self.collapse(id, frame)
      {
        collapses += 1;
      }

      if !visibility.is_visible() {
        if let Some(node) = self.octree.get_mut(id) {
          if node.state == NodeState::Empty && node.pending.is_none() && !node.geometry_tested {
            node.state = NodeState::Culled;
          }
        }
        continue;
      }
      if let Some(node) = self.octree.get_mut(id) {
        if node.state == NodeState::Culled {
          node.state = NodeState::Empty;
        }
      }

      self.refresh(id, frame);

      let Some(node) = self.octree.get(id) else {
        continue;
      };
      if let Some(children) = node.children {
        stack.extend(children);
        continue;
      }
      if budget.can_subdivide(subdivisions) && self.can_split(id) && self.subdivide(id, frame) {
        subdivisions += 1;
      }
    }
  }

  /// Request whatever generation work a visible node is missing.
  fn refresh(&mut self, id: NodeId, frame: &mut Frame) {
    let epoch = self.epoch;
    let Some(node) = self.octree.get(id) else {
      return;
    };
    let visible = RequestKind {
      visible: true,
      essential: !self.parent_has_chunk(id),
      speculative: false,
    };
    if node.pending.is_some() {
      // Upgrades a queued background request, if there is one.
      self.request_generation(id, visible, frame);
      return;
    }

    let untested = !node.geometry_tested;
    let retest = node.needs_retest(epoch);
    let outdated_mesh = node.is_leaf() && node.chunk.is_some() && node.tested_epoch != epoch;
    if !(untested || retest || outdated_mesh || node.needs_reload()) {
      return;
    }
    if node.tested_epoch != epoch && node.geometry_tested {
      if let Some(node) = self.octree.get_mut(id) {
        node.cull_state = CullState::Unknown;
      }
    }
    if (untested || retest) && self.prefilter(id, frame) {
      return;
    }
    self.request_generation(id, visible, frame);
  }

  fn parent_has_chunk(&self, id: NodeId) -> bool {
    self
      .octree
      .get(id)
      .and_then(|node| node.parent)
      .and_then(|parent| self.octree.get(parent))
      .is_some_and(|parent| parent.chunk.is_some())
  }

  /// Leaf is close enough, has a mesh and nothing outstanding, and the
  /// resident budget has room.
  fn can_split(&self, id: NodeId) -> bool {
    let Some(node) = self.octree.get(id) else {
      return false;
    };
    node.state == NodeState::Ready
      && node.chunk.is_some()
      && node.pending.is_none()
      && !node.retry
      && self.octree.resident_chunks() < self.config.max_resident_chunks
      && self
        .octree
        .should_subdivide(id, self.config.max_level(), &self.lod)
  }

  /// Create the 8 children of `id` and request the visible ones.
  fn subdivide(&mut self, id: NodeId, frame: &mut Frame) -> bool {
    let Some(children) = self.octree.create_children(id, &self.config) else {
      return false;
    };
    // The parent holds a chunk, so its children never fill a gap.
    let kind = RequestKind {
      visible: true,
      essential: false,
      speculative: false,
    };
    for child in children {
      if !self.observe(child, frame).is_visible() {
        if let Some(node) = self.octree.get_mut(child) {
          node.state = NodeState::Culled;
        }
        continue;
      }
      if !self.prefilter(child, frame) {
        self.request_generation(child, kind, frame);
      }
    }
    if let Some(node) = self.octree.get(id) {
      tracing::debug!(key = ?node.key, distance = node.distance_to_camera, "subdivide");
    }
    frame.report.subdivisions += 1;
    true
  }

  /// Destroy the subtree below `id`.
  ///
  /// A node whose own chunk was released by the resident budget reloads it
  /// first; the children stay until the coarse mesh is back. That reload is
  /// essential: it is the ancestor mesh that replaces the whole subtree.
  fn collapse(&mut self, id: NodeId, frame: &mut Frame) -> bool {
    let Some(node) = self.octree.get(id) else {
      return false;
    };
    if node.has_geometry && node.chunk.is_none() && !node.retry {
      if node.pending.is_none() {
        let kind = RequestKind {
          visible: self.subtree_visible(id),
          essential: true,
          speculative: false,
        };
        self.request_generation(id, kind, frame);
      }
      return false;
    }

    let destroyed = self.octree.destroy_children(id);
    for (child, _) in &destroyed.pending {
      self.scheduler.cancel(*child);
    }
    if let Some(node) = self.octree.get_mut(id) {
      if node.pending.is_none() {
        node.state = idle_state(node);
      }
      tracing::debug!(
        key = ?node.key,
        removed = destroyed.removed.len(),
        released = destroyed.released_chunks,
        "collapse"
      );
    }
    frame.report.collapses += 1;
    true
  }

  /// The node or one of its children was visible on its last observation.
  fn subtree_visible(&self, id: NodeId) -> bool {
    let Some(node) = self.octree.get(id) else {
      return false;
    };
    node.is_visible
      || node.children.is_some_and(|children| {
        children
          .iter()
          .any(|c| self.octree.get(*c).is_some_and(|child| child.is_visible))
      })
  }

  /// Release chunks of covered internal nodes, farthest first, until the
  /// resident count is back under the limit.
  pub(super) fn enforce_resident_budget(&mut self, frame: &mut Frame) {
    let limit = self.config.max_resident_chunks;
    let resident = self.octree.resident_chunks();
    if resident <= limit {
      return;
    }

    let mut candidates: Vec<(f32, NodeId)> = self
      .octree
      .iter()
      .filter(|(id, node)| {
        node.chunk.is_some()
          && node.pending.is_none()
          && node.distance_to_camera < self.lod.get(node.level).collapse
          && self.octree.children_settled(*id)
      })
      .map(|(id, node)| (node.distance_to_camera, id))
      .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (_, id) in candidates.into_iter().take(resident - limit) {
      if self.octree.release_chunk(id) {
        if let Some(node) = self.octree.get_mut(id) {
          node.state = NodeState::Subdivided;
        }
        frame.report.budget_releases += 1;
      }
    }

    let over = self.octree.resident_chunks().saturating_sub(limit);
    if over > 0 {
      tracing::debug!(over, "resident budget exceeded by visible leaves");
    }
  }
}
