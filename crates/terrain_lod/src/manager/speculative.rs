//! Speculative prefetch along the camera's predicted path.
//!
//! When the camera moves fast enough, the existing nodes on the path from the
//! root down to the predicted position get background requests. These sit
//! in the speculative tier: below every visible request, above plain
//! background work.

use smallvec::SmallVec;

use super::{ChunkManager, Frame, RequestKind};
use crate::octree::NodeId;

const SPECULATIVE: RequestKind = RequestKind {
  visible: false,
  essential: false,
  speculative: true,
};

impl ChunkManager {
  pub(super) fn prefetch(&mut self, frame: &mut Frame) {
    let prefetch = self.config.prefetch;
    if !prefetch.enabled || prefetch.max_requests_per_frame == 0 {
      return;
    }
    let speed = self.velocity.length();
    if speed <= prefetch.speed_threshold {
      return;
    }
    if self.scheduler.regular().fill() >= prefetch.max_queue_fill {
      return;
    }

    let target = frame.camera + self.velocity * prefetch.lookahead_seconds;
    let path = self.path_to(target);
    let mut issued = 0;
    for id in path {
      if issued >= prefetch.max_requests_per_frame {
        break;
      }
      let wanted = self.octree.get(id).is_some_and(|node| {
        node.pending.is_none() && (!node.geometry_tested || node.needs_reload())
      });
      if !wanted || self.prefilter(id, frame) {
        continue;
      }
      if self.request_generation(id, SPECULATIVE, frame) {
        issued += 1;
      }
    }
    if issued > 0 {
      tracing::trace!(issued, speed, "speculative prefetch");
    }
    frame.report.speculative += issued;
  }

  /// Existing nodes containing `target`, root first.
  fn path_to(&self, target: glam::Vec3) -> SmallVec<[NodeId; 16]> {
    let mut path = SmallVec::new();
    let mut current = self.octree.root();
    loop {
      let Some(node) = self.octree.get(current) else {
        break;
      };
      if !node.bounds().contains_point(target) {
        break;
      }
      path.push(current);
      let Some(children) = node.children else {
        break;
      };
      let mut octant = 0usize;
      if target.x >= node.center.x {
        octant |= 1;
      }
      if target.y >= node.center.y {
        octant |= 2;
      }
      if target.z >= node.center.z {
        octant |= 4;
      }
      current = children[octant];
    }
    path
  }
}
